use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::post::{PostId, PostView};

/// Hard upper bound on a page, whatever the client asks for.
pub const MAX_PAGE_LIMIT: u32 = 50;
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// What slice of the approved timeline to read.
///
/// Backfill (`Latest`, `Before`) walks towards older posts; `Since` walks
/// towards newer ones. A single query never mixes the two directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageQuery {
    /// The most recent posts, skipping `offset` of them.
    Latest { limit: u32, offset: u64 },
    /// Posts past `cursor` in newest-first order.
    Before { limit: u32, cursor: PageCursor },
    /// The oldest `limit` posts strictly newer than `marker`.
    Since { limit: u32, marker: DateTime<Utc> },
}

impl PageQuery {
    pub fn limit(&self) -> u32 {
        match self {
            Self::Latest { limit, .. } | Self::Before { limit, .. } | Self::Since { limit, .. } => *limit,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            Self::Latest { offset, .. } => *offset,
            Self::Before { .. } | Self::Since { .. } => 0,
        }
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Since { .. })
    }
}

/// Position of the last post of a backfill page.
///
/// Listings are ordered by `(created_at, id)` descending. The id lets a page
/// boundary fall between posts created at the same instant; without it the
/// cursor only admits strictly older posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Option<PostId>,
}

impl PageCursor {
    pub fn at(created_at: DateTime<Utc>) -> Self {
        Self { created_at, id: None }
    }

    pub fn after(view: &PostView) -> Self {
        Self { created_at: view.post.created_at, id: Some(view.post.id) }
    }

    /// Whether a post sorts after this cursor in newest-first order.
    pub fn admits(&self, created_at: DateTime<Utc>, id: PostId) -> bool {
        created_at < self.created_at
            || (created_at == self.created_at && self.id.is_some_and(|boundary| id < boundary))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
    /// A full page implies more may exist. Cheap approximation, not a count.
    pub has_next_page: bool,
    /// Creation time of the oldest returned post when another backfill page
    /// may exist.
    pub next_cursor: Option<DateTime<Utc>>,
    /// Id of that same post, sent back as `cursorId` to break timestamp ties.
    #[serde(default)]
    pub next_cursor_id: Option<PostId>,
    pub total_returned: usize,
}

impl Pagination {
    /// Where the following backfill page starts, if there is one.
    pub fn next_page_cursor(&self) -> Option<PageCursor> {
        self.next_cursor.map(|created_at| PageCursor { created_at, id: self.next_cursor_id })
    }
}

/// Posts in reverse-chronological order plus paging metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub posts: Vec<PostView>,
    pub pagination: Pagination,
}

impl Page {
    /// Wraps the posts returned for `query`, which must already be ordered
    /// newest first.
    pub fn new(query: PageQuery, posts: Vec<PostView>) -> Self {
        let limit = query.limit();
        let has_next_page = posts.len() == limit as usize;
        let boundary = if has_next_page && !query.is_incremental() {
            posts.last().map(PageCursor::after)
        } else {
            None
        };
        Self {
            pagination: Pagination {
                limit,
                offset: query.offset(),
                has_next_page,
                next_cursor: boundary.map(|cursor| cursor.created_at),
                next_cursor_id: boundary.and_then(|cursor| cursor.id),
                total_returned: posts.len(),
            },
            posts,
        }
    }
}

/// Client-side traversal state over the timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineCursor {
    /// Where the next backfill page starts, `None` when exhausted.
    pub next_cursor: Option<DateTime<Utc>>,
    /// Creation time of the newest post held locally.
    pub since_marker: Option<DateTime<Utc>>,
    pub has_next_page: bool,
}
