use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// Maximum number of characters a post may hold after sanitization.
pub const MAX_CONTENT_CHARS: usize = 500;

/// Opaque post identifier, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub Uuid);

impl PostId {
    /// Generates a new time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PostId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Opaque user/profile identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public part of a member profile. Profiles are managed elsewhere; this
/// system only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub nickname: String,
    pub avatar_url: Option<String>,
}

/// Flat status as exposed on the wire and stored in the posts table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Approved,
    Rejected,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for PostStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::Persistence(format!("unknown post status '{other}'"))),
        }
    }
}

/// Who moved a post into the approved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalSource {
    /// The AI judge approved the content.
    Judge,
    /// The deployment-wide early-access auto-approval override fired.
    Override,
}

impl ApprovalSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Judge => "judge",
            Self::Override => "override",
        }
    }
}

impl FromStr for ApprovalSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "judge" => Ok(Self::Judge),
            "override" => Ok(Self::Override),
            other => Err(DomainError::Persistence(format!("unknown approval source '{other}'"))),
        }
    }
}

/// Moderation state of a post, keeping the provenance of an approval.
///
/// The wire format flattens this into `status` + `approvedAt`; internally the
/// two approval paths stay distinct so an override is never reported as an
/// AI approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationState {
    Pending,
    ApprovedByJudge { at: DateTime<Utc> },
    ApprovedByOverride { at: DateTime<Utc> },
    Rejected,
}

impl ModerationState {
    pub fn status(&self) -> PostStatus {
        match self {
            Self::Pending => PostStatus::Pending,
            Self::ApprovedByJudge { .. } | Self::ApprovedByOverride { .. } => PostStatus::Approved,
            Self::Rejected => PostStatus::Rejected,
        }
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::ApprovedByJudge { at } | Self::ApprovedByOverride { at } => Some(*at),
            Self::Pending | Self::Rejected => None,
        }
    }

    pub fn approval_source(&self) -> Option<ApprovalSource> {
        match self {
            Self::ApprovedByJudge { .. } => Some(ApprovalSource::Judge),
            Self::ApprovedByOverride { .. } => Some(ApprovalSource::Override),
            Self::Pending | Self::Rejected => None,
        }
    }

    /// Rebuilds the state from its stored columns, enforcing that
    /// `approved_at` is present iff the status is approved.
    pub fn from_parts(
        status: PostStatus,
        approved_at: Option<DateTime<Utc>>,
        source: Option<ApprovalSource>,
    ) -> Result<Self, DomainError> {
        match (status, approved_at) {
            (PostStatus::Pending, None) => Ok(Self::Pending),
            (PostStatus::Rejected, None) => Ok(Self::Rejected),
            (PostStatus::Approved, Some(at)) => match source {
                Some(ApprovalSource::Override) => Ok(Self::ApprovedByOverride { at }),
                Some(ApprovalSource::Judge) | None => Ok(Self::ApprovedByJudge { at }),
            },
            (status, at) => Err(DomainError::Persistence(format!(
                "inconsistent moderation columns: status={} approved_at={at:?}",
                status.as_str()
            ))),
        }
    }
}

/// A one-way move out of the pending state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The judge approved the content. Sets `moderationPassed = true`.
    ApproveByJudge { at: DateTime<Utc>, rationale: Vec<String> },
    /// The auto-approval override fired. Leaves `moderationPassed` untouched.
    ApproveByOverride { at: DateTime<Utc> },
    /// The judge rejected the content, or could not be reached.
    Reject { rationale: Vec<String> },
}

/// A post as submitted, before it has been stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub id: PostId,
    pub author_id: ProfileId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The fundamental unit of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PostRecord", try_from = "PostRecord")]
pub struct Post {
    pub id: PostId,
    pub author_id: ProfileId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub moderation: ModerationState,
    /// Verdict of the judge, `None` until one is known.
    pub moderation_passed: Option<bool>,
    /// Human-readable reasons attached to the verdict.
    pub moderation_rationale: Option<Vec<String>>,
}

impl Post {
    /// A freshly inserted pending post.
    pub fn pending(new: NewPost) -> Self {
        Self {
            id: new.id,
            author_id: new.author_id,
            content: new.content,
            created_at: new.created_at,
            moderation: ModerationState::Pending,
            moderation_passed: None,
            moderation_rationale: None,
        }
    }

    pub fn status(&self) -> PostStatus {
        self.moderation.status()
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.moderation.approved_at()
    }

    pub fn is_visible(&self) -> bool {
        self.status() == PostStatus::Approved
    }

    /// Applies a transition. Returns `false` and leaves the post untouched
    /// if it is no longer pending.
    pub fn apply(&mut self, transition: Transition) -> bool {
        if self.moderation != ModerationState::Pending {
            return false;
        }
        match transition {
            Transition::ApproveByJudge { at, rationale } => {
                self.moderation = ModerationState::ApprovedByJudge { at };
                self.moderation_passed = Some(true);
                self.moderation_rationale = Some(rationale);
            }
            Transition::ApproveByOverride { at } => {
                self.moderation = ModerationState::ApprovedByOverride { at };
            }
            Transition::Reject { rationale } => {
                self.moderation = ModerationState::Rejected;
                self.moderation_passed = Some(false);
                self.moderation_rationale = Some(rationale);
            }
        }
        true
    }
}

/// Flat wire/storage representation of a [`Post`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: PostId,
    pub author_id: ProfileId,
    pub content: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_source: Option<ApprovalSource>,
    pub moderation_passed: Option<bool>,
    pub moderation_rationale: Option<Vec<String>>,
}

impl From<Post> for PostRecord {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            status: post.status(),
            approved_at: post.approved_at(),
            approval_source: post.moderation.approval_source(),
            author_id: post.author_id,
            content: post.content,
            created_at: post.created_at,
            moderation_passed: post.moderation_passed,
            moderation_rationale: post.moderation_rationale,
        }
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = DomainError;

    fn try_from(record: PostRecord) -> Result<Self, Self::Error> {
        let moderation =
            ModerationState::from_parts(record.status, record.approved_at, record.approval_source)?;
        Ok(Self {
            id: record.id,
            author_id: record.author_id,
            content: record.content,
            created_at: record.created_at,
            moderation,
            moderation_passed: record.moderation_passed,
            moderation_rationale: record.moderation_rationale,
        })
    }
}

/// A visible post together with its author's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<Profile>,
}
