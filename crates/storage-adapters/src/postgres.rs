//! # PostgreSQL store
//!
//! Maps the relational model in `migrations/` onto the domain types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    ApprovalSource, DomainError, NewPost, PageQuery, Post, PostId, PostRecord, PostRepository,
    PostStatus, PostView, Profile, ProfileId, ProfileRepository, ReactionCounts, ReactionIntent,
    ReactionRepository, ReactionType, Transition, UserReactionState,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

const POST_COLUMNS: &str = "p.id, p.author_id, p.content, p.status, p.created_at, p.approved_at, \
     p.approval_source, p.moderation_passed, p.moderation_rationale";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and applies pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_error)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| DomainError::Persistence(format!("migration failed: {err}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(err: sqlx::Error) -> DomainError {
    DomainError::Persistence(err.to_string())
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: Uuid,
    author_id: String,
    content: String,
    status: String,
    created_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    approval_source: Option<String>,
    moderation_passed: Option<bool>,
    moderation_rationale: Option<Vec<String>>,
}

impl TryFrom<PostRow> for Post {
    type Error = DomainError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let approval_source = row
            .approval_source
            .as_deref()
            .map(str::parse::<ApprovalSource>)
            .transpose()?;
        Post::try_from(PostRecord {
            id: PostId(row.id),
            author_id: ProfileId::new(row.author_id),
            content: row.content,
            status: row.status.parse::<PostStatus>()?,
            created_at: row.created_at,
            approved_at: row.approved_at,
            approval_source,
            moderation_passed: row.moderation_passed,
            moderation_rationale: row.moderation_rationale,
        })
    }
}

#[derive(Debug, FromRow)]
struct PostViewRow {
    #[sqlx(flatten)]
    post: PostRow,
    author_nickname: Option<String>,
    author_avatar_url: Option<String>,
}

impl TryFrom<PostViewRow> for PostView {
    type Error = DomainError;

    fn try_from(row: PostViewRow) -> Result<Self, Self::Error> {
        let post = Post::try_from(row.post)?;
        let author = row.author_nickname.map(|nickname| Profile {
            id: post.author_id.clone(),
            nickname,
            avatar_url: row.author_avatar_url,
        });
        Ok(PostView { post, author })
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    id: String,
    nickname: String,
    avatar_url: Option<String>,
}

#[async_trait]
impl ProfileRepository for PgStore {
    #[tracing::instrument(skip_all, name = "db.profiles.find")]
    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, DomainError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, nickname, avatar_url FROM profiles WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|row| Profile {
            id: ProfileId::new(row.id),
            nickname: row.nickname,
            avatar_url: row.avatar_url,
        }))
    }
}

#[async_trait]
impl PostRepository for PgStore {
    #[tracing::instrument(skip_all, name = "db.posts.insert")]
    async fn insert_pending(&self, new: NewPost) -> Result<Post, DomainError> {
        let sql = format!(
            "INSERT INTO posts AS p (id, author_id, content, status, created_at) \
             VALUES ($1, $2, $3, 'pending', $4) RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(new.id.0)
            .bind(new.author_id.as_str())
            .bind(&new.content)
            .bind(new.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Post::try_from(row)
    }

    /// # Developer Note
    /// The `status = 'pending'` guard makes this a compare-and-set: a second
    /// transition on the same post matches no row and returns `None`.
    #[tracing::instrument(skip_all, name = "db.posts.transition", fields(post_id = %id))]
    async fn transition(
        &self,
        id: PostId,
        transition: Transition,
    ) -> Result<Option<Post>, DomainError> {
        let (status, approved_at, source, passed, rationale) = match transition {
            Transition::ApproveByJudge { at, rationale } => (
                PostStatus::Approved,
                Some(at),
                Some(ApprovalSource::Judge),
                Some(true),
                Some(rationale),
            ),
            Transition::ApproveByOverride { at } => {
                (PostStatus::Approved, Some(at), Some(ApprovalSource::Override), None, None)
            }
            Transition::Reject { rationale } => {
                (PostStatus::Rejected, None, None, Some(false), Some(rationale))
            }
        };

        let sql = format!(
            "UPDATE posts AS p SET status = $2, approved_at = $3, approval_source = $4, \
             moderation_passed = COALESCE($5, p.moderation_passed), \
             moderation_rationale = COALESCE($6, p.moderation_rationale) \
             WHERE p.id = $1 AND p.status = 'pending' RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.0)
            .bind(status.as_str())
            .bind(approved_at)
            .bind(source.map(ApprovalSource::as_str))
            .bind(passed)
            .bind(rationale)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(Post::try_from).transpose()
    }

    #[tracing::instrument(skip_all, name = "db.posts.record_verdict", fields(post_id = %id))]
    async fn record_verdict(
        &self,
        id: PostId,
        passed: bool,
        rationale: Vec<String>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE posts SET moderation_passed = $2, moderation_rationale = $3 WHERE id = $1",
        )
        .bind(id.0)
        .bind(passed)
        .bind(rationale)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PostNotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, name = "db.posts.find")]
    async fn find_post(&self, id: PostId) -> Result<Option<Post>, DomainError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Post::try_from).transpose()
    }

    #[tracing::instrument(skip_all, name = "db.posts.list_approved", fields(query = ?query))]
    async fn list_approved(&self, query: PageQuery) -> Result<Vec<PostView>, DomainError> {
        let select = format!(
            "SELECT {POST_COLUMNS}, pr.nickname AS author_nickname, pr.avatar_url AS author_avatar_url \
             FROM posts p LEFT JOIN profiles pr ON pr.id = p.author_id \
             WHERE p.status = 'approved'"
        );
        let limit = i64::from(query.limit());

        let rows = match query {
            PageQuery::Latest { offset, .. } => {
                let sql = format!(
                    "{select} ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2"
                );
                sqlx::query_as::<_, PostViewRow>(&sql)
                    .bind(limit)
                    .bind(i64::try_from(offset).unwrap_or(i64::MAX))
                    .fetch_all(&self.pool)
                    .await
            }
            PageQuery::Before { cursor, .. } => {
                // Row comparison keeps posts that share the boundary timestamp.
                let position = match cursor.id {
                    Some(_) => "(p.created_at, p.id) < ($1, $3)",
                    None => "p.created_at < $1",
                };
                let sql = format!(
                    "{select} AND {position} ORDER BY p.created_at DESC, p.id DESC LIMIT $2"
                );
                let mut statement = sqlx::query_as::<_, PostViewRow>(&sql)
                    .bind(cursor.created_at)
                    .bind(limit);
                if let Some(id) = cursor.id {
                    statement = statement.bind(id.0);
                }
                statement.fetch_all(&self.pool).await
            }
            PageQuery::Since { marker, .. } => {
                // Oldest newer posts first, then flipped back to newest first.
                let sql = format!(
                    "SELECT * FROM ({select} AND p.created_at > $1 \
                     ORDER BY p.created_at ASC, p.id ASC LIMIT $2) newer \
                     ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, PostViewRow>(&sql)
                    .bind(marker)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_error)?;

        rows.into_iter().map(PostView::try_from).collect()
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl ReactionRepository for PgStore {
    /// # Developer Note
    /// The primary key on (post_id, user_id, reaction_type) keeps duplicates
    /// out even when two requests race; the transaction only makes a flip's
    /// delete-or-insert a single unit.
    #[tracing::instrument(skip_all, name = "db.reactions.apply", fields(post_id = %post_id, kind = %kind))]
    async fn apply(
        &self,
        post_id: PostId,
        user_id: &ProfileId,
        kind: ReactionType,
        intent: ReactionIntent,
    ) -> Result<bool, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // 1. Remove the reaction unless the caller wants it active
        let removed = if intent == ReactionIntent::Set(true) {
            false
        } else {
            sqlx::query(
                "DELETE FROM reactions WHERE post_id = $1 AND user_id = $2 AND reaction_type = $3",
            )
            .bind(post_id.0)
            .bind(user_id.as_str())
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected()
                > 0
        };

        // 2. Insert it when it should end up active
        let active = match intent {
            ReactionIntent::Flip => !removed,
            ReactionIntent::Set(active) => active,
        };
        if active {
            sqlx::query(
                "INSERT INTO reactions (post_id, user_id, reaction_type) VALUES ($1, $2, $3) \
                 ON CONFLICT (post_id, user_id, reaction_type) DO NOTHING",
            )
            .bind(post_id.0)
            .bind(user_id.as_str())
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(active)
    }

    #[tracing::instrument(skip_all, name = "db.reactions.counts")]
    async fn counts(&self, post_id: PostId) -> Result<ReactionCounts, DomainError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT reaction_type, COUNT(*) FROM reactions WHERE post_id = $1 GROUP BY reaction_type",
        )
        .bind(post_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut counts = ReactionCounts::default();
        for (kind, count) in rows {
            counts.set(parse_stored_kind(&kind)?, u64::try_from(count).unwrap_or(0));
        }
        Ok(counts)
    }

    #[tracing::instrument(skip_all, name = "db.reactions.user_state")]
    async fn user_state(
        &self,
        post_id: PostId,
        user_id: &ProfileId,
    ) -> Result<UserReactionState, DomainError> {
        let kinds: Vec<String> = sqlx::query_scalar(
            "SELECT reaction_type FROM reactions WHERE post_id = $1 AND user_id = $2",
        )
        .bind(post_id.0)
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut state = UserReactionState::default();
        for kind in kinds {
            state.set(parse_stored_kind(&kind)?, true);
        }
        Ok(state)
    }
}

fn parse_stored_kind(raw: &str) -> Result<ReactionType, DomainError> {
    raw.parse()
        .map_err(|_| DomainError::Persistence(format!("unknown stored reaction type {raw:?}")))
}
