use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason code attached when the judge cannot be consulted.
pub const REASON_MODERATION_UNAVAILABLE: &str = "moderation_unavailable";

/// The judge's decision on one piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_approved: bool,
    /// Between 0.0 and 1.0.
    pub confidence_score: f64,
    /// Machine codes, optionally followed by `: detail`.
    pub rejection_reasons: Vec<String>,
    /// A more positive phrasing of the same content, if the judge offered one.
    pub suggested_content: Option<String>,
}

impl Verdict {
    /// The rejection used whenever the judge is unreachable or its answer is
    /// unusable. An unknown outcome is never an approval.
    pub fn fail_closed() -> Self {
        Self {
            is_approved: false,
            confidence_score: 0.0,
            rejection_reasons: vec![REASON_MODERATION_UNAVAILABLE.to_string()],
            suggested_content: None,
        }
    }

    pub fn is_fail_closed(&self) -> bool {
        !self.is_approved
            && self.rejection_reasons.len() == 1
            && self.rejection_reasons[0] == REASON_MODERATION_UNAVAILABLE
    }
}

/// Failures of the external judge call.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("moderation service timed out")]
    Timeout,

    #[error("moderation service unreachable: {0}")]
    Transport(String),

    #[error("moderation service answered with status {0}")]
    Status(u16),

    #[error("malformed moderation payload: {0}")]
    MalformedPayload(String),
}
