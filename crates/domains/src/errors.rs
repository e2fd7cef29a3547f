//! # Errors
//!
//! Centralized error handling for the Sanctuary ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

use crate::models::{PostId, ProfileId, MAX_CONTENT_CHARS};

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Content is empty once trimmed and sanitized
    #[error("content must not be empty")]
    EmptyContent,

    /// Content is longer than the limit once sanitized
    #[error("content must be at most {max} characters (got {0})", max = MAX_CONTENT_CHARS)]
    ContentTooLong(usize),

    /// A `cursor` or `since` value that is not a timestamp
    #[error("Invalid cursor/since format")]
    InvalidTimestamp(String),

    /// Bad `limit`/`offset`, or traversal parameters that must not be combined
    #[error("Invalid pagination parameters")]
    InvalidPagination(String),

    /// Missing or unknown reaction type
    #[error("invalid reaction type: {0}")]
    InvalidReactionType(String),

    /// No verified identity on a request that needs one
    #[error("authentication required")]
    Unauthenticated,

    /// The authenticated identity has no profile
    #[error("author profile {0} not found")]
    AuthorNotFound(ProfileId),

    /// Unknown post, or a post that is not visible
    #[error("post {0} not found")]
    PostNotFound(PostId),

    /// Infrastructure failure (e.g., DB down)
    #[error("storage failure: {0}")]
    Persistence(String),
}

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    NotFound,
    Persistence,
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyContent
            | Self::ContentTooLong(_)
            | Self::InvalidTimestamp(_)
            | Self::InvalidPagination(_)
            | Self::InvalidReactionType(_) => ErrorKind::Validation,
            Self::Unauthenticated => ErrorKind::Auth,
            Self::AuthorNotFound(_) | Self::PostNotFound(_) => ErrorKind::NotFound,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

/// Identity verification failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    Expired,
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;
