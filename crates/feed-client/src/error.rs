use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("not authenticated")]
    Unauthenticated,

    /// Non-success answer carrying the server's `{ error }` message.
    #[error("server answered {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Unauthenticated | Self::InvalidResponse(_) => false,
        }
    }
}
