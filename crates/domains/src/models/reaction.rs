use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The four fixed reaction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Thanks,
    Support,
    Empathy,
    Wonderful,
}

impl ReactionType {
    pub const ALL: [ReactionType; 4] = [Self::Thanks, Self::Support, Self::Empathy, Self::Wonderful];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thanks => "thanks",
            Self::Support => "support",
            Self::Empathy => "empathy",
            Self::Wonderful => "wonderful",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::InvalidReactionType(s.to_string()))
    }
}

/// Aggregate reaction counters of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub thanks: u64,
    pub support: u64,
    pub empathy: u64,
    pub wonderful: u64,
}

impl ReactionCounts {
    pub fn get(&self, kind: ReactionType) -> u64 {
        match kind {
            ReactionType::Thanks => self.thanks,
            ReactionType::Support => self.support,
            ReactionType::Empathy => self.empathy,
            ReactionType::Wonderful => self.wonderful,
        }
    }

    pub fn set(&mut self, kind: ReactionType, value: u64) {
        match kind {
            ReactionType::Thanks => self.thanks = value,
            ReactionType::Support => self.support = value,
            ReactionType::Empathy => self.empathy = value,
            ReactionType::Wonderful => self.wonderful = value,
        }
    }

    /// Moves one counter up or down by one, never below zero.
    pub fn adjust(&mut self, kind: ReactionType, increment: bool) {
        let current = self.get(kind);
        let next = if increment { current.saturating_add(1) } else { current.saturating_sub(1) };
        self.set(kind, next);
    }

    pub fn total(&self) -> u64 {
        ReactionType::ALL.iter().map(|kind| self.get(*kind)).sum()
    }

    pub fn has_any(&self) -> bool {
        self.total() > 0
    }
}

/// Which reactions one user has active on one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReactionState {
    pub thanks: bool,
    pub support: bool,
    pub empathy: bool,
    pub wonderful: bool,
}

impl UserReactionState {
    pub fn get(&self, kind: ReactionType) -> bool {
        match kind {
            ReactionType::Thanks => self.thanks,
            ReactionType::Support => self.support,
            ReactionType::Empathy => self.empathy,
            ReactionType::Wonderful => self.wonderful,
        }
    }

    pub fn set(&mut self, kind: ReactionType, active: bool) {
        match kind {
            ReactionType::Thanks => self.thanks = active,
            ReactionType::Support => self.support = active,
            ReactionType::Empathy => self.empathy = active,
            ReactionType::Wonderful => self.wonderful = active,
        }
    }
}

/// Aggregate counts plus the requesting user's own state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    pub counts: ReactionCounts,
    pub user_reactions: UserReactionState,
}

/// What a toggle request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionIntent {
    /// Flip whatever state the server currently holds.
    Flip,
    /// Converge on the given state. Retrying is harmless.
    Set(bool),
}

impl From<Option<bool>> for ReactionIntent {
    fn from(active: Option<bool>) -> Self {
        active.map_or(Self::Flip, Self::Set)
    }
}

impl ReactionIntent {
    /// The resulting state given the currently stored one.
    pub fn resolve(self, currently_active: bool) -> bool {
        match self {
            Self::Flip => !currently_active,
            Self::Set(active) => active,
        }
    }
}

/// Result of a toggle, with server-authoritative counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub reaction_type: ReactionType,
    pub active: bool,
    pub counts: ReactionCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_the_four_types() {
        assert_eq!("support".parse::<ReactionType>().unwrap(), ReactionType::Support);
        assert!(matches!(
            "like".parse::<ReactionType>(),
            Err(DomainError::InvalidReactionType(kind)) if kind == "like"
        ));
    }

    #[test]
    fn counters_never_go_negative() {
        let mut counts = ReactionCounts::default();
        counts.adjust(ReactionType::Empathy, false);
        assert_eq!(counts.empathy, 0);
        counts.adjust(ReactionType::Empathy, true);
        counts.adjust(ReactionType::Thanks, true);
        assert_eq!(counts.total(), 2);
        assert!(counts.has_any());
    }

    #[test]
    fn intent_resolution() {
        assert!(ReactionIntent::Flip.resolve(false));
        assert!(!ReactionIntent::Flip.resolve(true));
        assert!(ReactionIntent::Set(true).resolve(true));
        assert_eq!(ReactionIntent::from(None), ReactionIntent::Flip);
    }
}
