//! # Timeline reads
//!
//! Turns raw query-string values into a [`PageQuery`] and reads approved
//! posts through the repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    DomainError, Page, PageCursor, PageQuery, PostId, PostRepository, DEFAULT_PAGE_LIMIT,
    MAX_PAGE_LIMIT,
};
use serde::Deserialize;
use tracing::debug;

/// Paging parameters exactly as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPageParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub cursor: Option<String>,
    /// Id of the post at `cursor`, as returned in `nextCursorId`.
    pub cursor_id: Option<String>,
    pub since: Option<String>,
}

impl RawPageParams {
    /// Validates the parameters.
    ///
    /// `limit` defaults to 10 and is clamped to 50. `cursor` selects older
    /// posts and `since` newer ones; they exclude each other, and `offset`
    /// only applies to the plain newest-first read. `cursorId` is only
    /// accepted together with `cursor`.
    pub fn parse(&self) -> Result<PageQuery, DomainError> {
        let limit = match present(&self.limit) {
            None => DEFAULT_PAGE_LIMIT,
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) | Err(_) => return Err(DomainError::InvalidPagination(raw.to_string())),
                Ok(limit) => limit.min(MAX_PAGE_LIMIT),
            },
        };

        let offset = present(&self.offset)
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|_| DomainError::InvalidPagination(raw.to_string()))
            })
            .transpose()?;

        let cursor = present(&self.cursor).map(parse_timestamp).transpose()?;
        let since = present(&self.since).map(parse_timestamp).transpose()?;
        let cursor_id = present(&self.cursor_id)
            .map(|raw| {
                raw.parse::<PostId>()
                    .map_err(|_| DomainError::InvalidPagination(raw.to_string()))
            })
            .transpose()?;

        let cursor = match (cursor, cursor_id) {
            (None, Some(_)) => {
                return Err(DomainError::InvalidPagination("cursorId requires cursor".into()))
            }
            (cursor, id) => cursor.map(|created_at| PageCursor { created_at, id }),
        };

        match (cursor, since, offset) {
            (Some(_), Some(_), _) => Err(DomainError::InvalidPagination(
                "cursor and since cannot be combined".into(),
            )),
            (_, Some(_), Some(_)) | (Some(_), _, Some(_)) => Err(DomainError::InvalidPagination(
                "offset cannot be combined with cursor or since".into(),
            )),
            (Some(cursor), None, None) => Ok(PageQuery::Before { limit, cursor }),
            (None, Some(marker), None) => Ok(PageQuery::Since { limit, marker }),
            (None, None, offset) => Ok(PageQuery::Latest { limit, offset: offset.unwrap_or(0) }),
        }
    }
}

/// Empty strings count as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| DomainError::InvalidTimestamp(raw.to_string()))
}

pub struct TimelineService {
    posts: Arc<dyn PostRepository>,
}

impl TimelineService {
    pub fn new(posts: Arc<dyn PostRepository>) -> Self {
        Self { posts }
    }

    /// Parses `params` and returns the matching page.
    pub async fn list(&self, params: &RawPageParams) -> Result<Page, DomainError> {
        let query = params.parse()?;
        self.fetch_page(query).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_page(&self, query: PageQuery) -> Result<Page, DomainError> {
        let posts = self.posts.list_approved(query).await?;
        debug!(returned = posts.len(), "timeline page read");
        Ok(Page::new(query, posts))
    }

    /// Approved posts created strictly after `marker`, newest first.
    pub async fn fetch_since(
        &self,
        marker: DateTime<Utc>,
        limit: u32,
    ) -> Result<Page, DomainError> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        self.fetch_page(PageQuery::Since { limit, marker }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockPostRepository, NewPost, Post, PostId, PostView, ProfileId, Transition};
    use mockall::predicate;
    use tokio_test::{assert_err, assert_ok};

    fn params(pairs: &[(&str, &str)]) -> RawPageParams {
        let mut params = RawPageParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "limit" => params.limit = value,
                "offset" => params.offset = value,
                "cursor" => params.cursor = value,
                "cursorId" => params.cursor_id = value,
                "since" => params.since = value,
                other => panic!("unknown key {other}"),
            }
        }
        params
    }

    #[test]
    fn defaults_to_ten_latest() {
        assert_eq!(
            assert_ok!(params(&[]).parse()),
            PageQuery::Latest { limit: 10, offset: 0 }
        );
    }

    #[test]
    fn large_limits_are_clamped() {
        let query = assert_ok!(params(&[("limit", "500"), ("offset", "20")]).parse());
        assert_eq!(query, PageQuery::Latest { limit: 50, offset: 20 });
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        for bad in [("limit", "0"), ("limit", "-3"), ("limit", "ten"), ("offset", "-1")] {
            let error = assert_err!(params(&[bad]).parse());
            assert!(matches!(error, DomainError::InvalidPagination(_)), "{bad:?}");
        }
    }

    #[test]
    fn cursor_selects_older_posts() {
        let query = assert_ok!(params(&[("cursor", "2024-03-01T12:00:00Z"), ("limit", "5")]).parse());
        let PageQuery::Before { limit, cursor } = query else {
            panic!("expected a backfill query, got {query:?}");
        };
        assert_eq!(limit, 5);
        assert_eq!(cursor.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
        assert_eq!(cursor.id, None);
    }

    #[test]
    fn cursor_id_breaks_ties_at_the_cursor() {
        let id = "0190e7a4-8f3b-7c2d-9a1e-5b6c7d8e9f00";
        let query = assert_ok!(params(&[("cursor", "2024-03-01T12:00:00Z"), ("cursorId", id)]).parse());
        let PageQuery::Before { cursor, .. } = query else {
            panic!("expected a backfill query, got {query:?}");
        };
        assert_eq!(cursor.id, Some(assert_ok!(id.parse::<PostId>())));
    }

    #[test]
    fn cursor_id_needs_a_valid_id_and_a_cursor() {
        let cases = [
            params(&[("cursor", "2024-03-01T12:00:00Z"), ("cursorId", "not-a-uuid")]),
            params(&[("cursorId", "0190e7a4-8f3b-7c2d-9a1e-5b6c7d8e9f00")]),
        ];
        for case in cases {
            let error = assert_err!(case.parse());
            assert!(matches!(error, DomainError::InvalidPagination(_)), "{error:?}");
        }
    }

    #[test]
    fn since_accepts_offsets_and_normalizes_to_utc() {
        let query = assert_ok!(params(&[("since", "2024-03-01T21:00:00+09:00")]).parse());
        let PageQuery::Since { marker, .. } = query else {
            panic!("expected an incremental query, got {query:?}");
        };
        assert_eq!(marker.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn bad_timestamps_are_rejected() {
        let error = assert_err!(params(&[("since", "yesterday")]).parse());
        assert!(matches!(error, DomainError::InvalidTimestamp(_)));
        assert_eq!(error.to_string(), "Invalid cursor/since format");
    }

    #[test]
    fn directions_do_not_mix() {
        let cases = [
            params(&[("cursor", "2024-03-01T12:00:00Z"), ("since", "2024-03-01T11:00:00Z")]),
            params(&[("since", "2024-03-01T11:00:00Z"), ("offset", "10")]),
            params(&[("cursor", "2024-03-01T12:00:00Z"), ("offset", "10")]),
        ];
        for case in cases {
            let error = assert_err!(case.parse());
            assert_eq!(error.to_string(), "Invalid pagination parameters");
        }
    }

    #[test]
    fn blank_values_count_as_absent() {
        let query = assert_ok!(params(&[("cursor", ""), ("limit", " ")]).parse());
        assert_eq!(query, PageQuery::Latest { limit: 10, offset: 0 });
    }

    fn approved_views(count: usize) -> Vec<PostView> {
        let newest = Utc::now();
        (0..count)
            .map(|i| {
                let created_at = newest - chrono::Duration::seconds(i as i64);
                let mut post = Post::pending(NewPost {
                    id: PostId::generate(),
                    author_id: ProfileId::new("alice"),
                    content: format!("post {i}"),
                    created_at,
                });
                post.apply(Transition::ApproveByJudge { at: created_at, rationale: vec![] });
                PostView { post, author: None }
            })
            .collect()
    }

    #[tokio::test]
    async fn full_page_reports_more() {
        let mut posts = MockPostRepository::new();
        posts
            .expect_list_approved()
            .with(predicate::eq(PageQuery::Latest { limit: 3, offset: 0 }))
            .times(1)
            .returning(|_| Ok(approved_views(3)));

        let service = TimelineService::new(Arc::new(posts));
        let page = assert_ok!(service.list(&params(&[("limit", "3")])).await);
        assert_eq!(page.posts.len(), 3);
        assert!(page.pagination.has_next_page);
        assert_eq!(page.pagination.next_cursor, Some(page.posts[2].post.created_at));
        assert_eq!(page.pagination.next_cursor_id, Some(page.posts[2].post.id));
    }

    #[tokio::test]
    async fn short_page_is_the_end() {
        let mut posts = MockPostRepository::new();
        posts.expect_list_approved().returning(|_| Ok(approved_views(2)));

        let service = TimelineService::new(Arc::new(posts));
        let page = assert_ok!(service.list(&params(&[])).await);
        assert!(!page.pagination.has_next_page);
        assert_eq!(page.pagination.next_cursor, None);
        assert_eq!(page.pagination.total_returned, 2);
    }

    #[tokio::test]
    async fn invalid_params_never_reach_storage() {
        let mut posts = MockPostRepository::new();
        posts.expect_list_approved().times(0);

        let service = TimelineService::new(Arc::new(posts));
        assert_err!(service.list(&params(&[("limit", "abc")])).await);
    }

    #[tokio::test]
    async fn fetch_since_clamps_its_limit() {
        let marker = Utc::now();
        let mut posts = MockPostRepository::new();
        posts
            .expect_list_approved()
            .with(predicate::eq(PageQuery::Since { limit: 50, marker }))
            .times(1)
            .returning(|_| Ok(vec![]));

        let service = TimelineService::new(Arc::new(posts));
        let page = assert_ok!(service.fetch_since(marker, 1_000).await);
        assert!(page.posts.is_empty());
    }
}
