//! # Moderation pipeline
//!
//! Validates and sanitizes submitted text, stores it as a pending post,
//! consults the AI judge, and moves the post to its final state.

pub mod messages;
pub mod sanitize;

use std::sync::Arc;

use domains::{
    ApprovalSource, Clock, ContentJudge, DomainError, NewPost, Post, PostId, PostRepository,
    ProfileId, ProfileRepository, Transition, Verdict,
};
use tracing::{debug, error, info, warn};

pub use sanitize::{prepare_content, strip_markup};

/// Deployment-wide moderation switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModerationPolicy {
    /// Early-access auto-approval: every freshly stored post is approved
    /// right away, whatever the judge later says.
    pub auto_approve: bool,
}

/// What became of a submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Published(Post),
    Rejected(RejectedSubmission),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedSubmission {
    pub post_id: PostId,
    pub reasons: Vec<String>,
    pub user_messages: Vec<String>,
    pub suggested_content: Option<String>,
    /// The judge could not be consulted.
    pub fail_closed: bool,
}

impl Submission {
    /// Short label used for logs and metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Published(post) => match post.moderation.approval_source() {
                Some(ApprovalSource::Override) => "approved_override",
                _ => "approved",
            },
            Self::Rejected(rejected) if rejected.fail_closed => "fail_closed",
            Self::Rejected(_) => "rejected",
        }
    }
}

pub struct ModerationService {
    posts: Arc<dyn PostRepository>,
    profiles: Arc<dyn ProfileRepository>,
    judge: Arc<dyn ContentJudge>,
    clock: Arc<dyn Clock>,
    policy: ModerationPolicy,
}

impl ModerationService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        profiles: Arc<dyn ProfileRepository>,
        judge: Arc<dyn ContentJudge>,
        clock: Arc<dyn Clock>,
        policy: ModerationPolicy,
    ) -> Self {
        Self { posts, profiles, judge, clock, policy }
    }

    pub fn policy(&self) -> ModerationPolicy {
        self.policy
    }

    /// Runs one submission through the pipeline.
    ///
    /// Validation errors are returned before anything is written or sent to
    /// the judge. The pending row is always stored before the judge is
    /// consulted, and the final status is written after it answers.
    #[tracing::instrument(skip_all, fields(author = %author_id, post_id = tracing::field::Empty))]
    pub async fn submit_post(
        &self,
        author_id: &ProfileId,
        raw_content: &str,
    ) -> Result<Submission, DomainError> {
        let content = prepare_content(raw_content)?;

        if self.profiles.find_profile(author_id).await?.is_none() {
            return Err(DomainError::AuthorNotFound(author_id.clone()));
        }

        let mut post = self
            .posts
            .insert_pending(NewPost {
                id: PostId::generate(),
                author_id: author_id.clone(),
                content,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::Span::current().record("post_id", tracing::field::display(post.id));
        debug!(chars = post.content.chars().count(), "pending post stored");

        if self.policy.auto_approve {
            post = self
                .transition(post.id, Transition::ApproveByOverride { at: self.clock.now() })
                .await?;
            info!("post approved by auto-approval override");
        }

        let verdict = self.consult_judge(&post.content).await;

        if self.policy.auto_approve {
            // The status is already final; keep the verdict for audit only.
            // A fail-closed verdict is not a real judgment and stays unrecorded.
            // The post is visible already, so a failed audit write must not
            // fail the submission.
            if !verdict.is_fail_closed() {
                match self
                    .posts
                    .record_verdict(post.id, verdict.is_approved, verdict.rejection_reasons.clone())
                    .await
                {
                    Ok(()) => {
                        post.moderation_passed = Some(verdict.is_approved);
                        post.moderation_rationale = Some(verdict.rejection_reasons);
                    }
                    Err(err) => error!(error = %err, "failed to record the judge verdict for an overridden post"),
                }
            }
            return Ok(Submission::Published(post));
        }

        if verdict.is_approved {
            let post = self
                .transition(
                    post.id,
                    Transition::ApproveByJudge {
                        at: self.clock.now(),
                        rationale: verdict.rejection_reasons,
                    },
                )
                .await?;
            info!(confidence = verdict.confidence_score, "post approved by judge");
            return Ok(Submission::Published(post));
        }

        let fail_closed = verdict.is_fail_closed();
        self.transition(
            post.id,
            Transition::Reject { rationale: verdict.rejection_reasons.clone() },
        )
        .await?;
        info!(
            confidence = verdict.confidence_score,
            reasons = ?verdict.rejection_reasons,
            fail_closed,
            "post rejected"
        );

        Ok(Submission::Rejected(RejectedSubmission {
            post_id: post.id,
            user_messages: messages::reason_messages(&verdict.rejection_reasons),
            reasons: verdict.rejection_reasons,
            suggested_content: verdict.suggested_content,
            fail_closed,
        }))
    }

    /// Asks the judge, turning every failure into a rejection.
    async fn consult_judge(&self, content: &str) -> Verdict {
        match self.judge.judge(content).await {
            Ok(verdict) => verdict,
            Err(error) => {
                warn!(%error, "moderation service failed, rejecting submission");
                Verdict::fail_closed()
            }
        }
    }

    async fn transition(&self, id: PostId, transition: Transition) -> Result<Post, DomainError> {
        self.posts.transition(id, transition).await?.ok_or_else(|| {
            DomainError::Persistence(format!("post {id} left the pending state unexpectedly"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{
        JudgeError, MockClock, MockContentJudge, MockPostRepository, MockProfileRepository,
        PostStatus, Profile, REASON_MODERATION_UNAVAILABLE,
    };
    use mockall::{predicate, Sequence};
    use tokio_test::{assert_err, assert_ok};

    fn alice() -> ProfileId {
        ProfileId::new("alice")
    }

    fn clock() -> MockClock {
        let mut clock = MockClock::new();
        clock.expect_now().returning(Utc::now);
        clock
    }

    fn profiles_with_alice() -> MockProfileRepository {
        let mut profiles = MockProfileRepository::new();
        profiles.expect_find_profile().returning(|id| {
            Ok((id.as_str() == "alice").then(|| Profile {
                id: id.clone(),
                nickname: "Alice".into(),
                avatar_url: None,
            }))
        });
        profiles
    }

    /// A repository that echoes writes back as if they were stored.
    fn echoing_posts() -> MockPostRepository {
        let mut posts = MockPostRepository::new();
        posts.expect_insert_pending().returning(|new| Ok(Post::pending(new)));
        posts.expect_transition().returning(|id, transition| {
            let mut post = Post::pending(NewPost {
                id,
                author_id: alice(),
                content: "stored".into(),
                created_at: Utc::now(),
            });
            post.apply(transition);
            Ok(Some(post))
        });
        posts
    }

    fn approving_judge() -> MockContentJudge {
        let mut judge = MockContentJudge::new();
        judge.expect_judge().returning(|_| {
            Ok(Verdict {
                is_approved: true,
                confidence_score: 0.92,
                rejection_reasons: vec![],
                suggested_content: None,
            })
        });
        judge
    }

    fn service(
        posts: MockPostRepository,
        judge: MockContentJudge,
        policy: ModerationPolicy,
    ) -> ModerationService {
        ModerationService::new(
            Arc::new(posts),
            Arc::new(profiles_with_alice()),
            Arc::new(judge),
            Arc::new(clock()),
            policy,
        )
    }

    #[tokio::test]
    async fn sanitized_content_is_stored_and_approved() {
        let mut posts = MockPostRepository::new();
        posts
            .expect_insert_pending()
            .withf(|new| new.content == "hello")
            .times(1)
            .returning(|new| Ok(Post::pending(new)));
        posts
            .expect_transition()
            .withf(|_, transition| matches!(transition, Transition::ApproveByJudge { .. }))
            .times(1)
            .returning(|id, transition| {
                let mut post = Post::pending(NewPost {
                    id,
                    author_id: alice(),
                    content: "hello".into(),
                    created_at: Utc::now(),
                });
                post.apply(transition);
                Ok(Some(post))
            });

        let mut judge = MockContentJudge::new();
        judge
            .expect_judge()
            .with(predicate::eq("hello"))
            .times(1)
            .returning(|_| {
                Ok(Verdict {
                    is_approved: true,
                    confidence_score: 0.9,
                    rejection_reasons: vec![],
                    suggested_content: None,
                })
            });

        let svc = service(posts, judge, ModerationPolicy::default());
        let outcome = assert_ok!(svc.submit_post(&alice(), "<script>alert(1)</script>hello").await);

        let Submission::Published(post) = outcome else {
            panic!("expected a published post");
        };
        assert_eq!(post.content, "hello");
        assert_eq!(post.status(), PostStatus::Approved);
        assert!(post.approved_at().is_some());
        assert_eq!(post.moderation_passed, Some(true));
    }

    #[tokio::test]
    async fn over_long_content_never_reaches_storage_or_judge() {
        let mut posts = MockPostRepository::new();
        posts.expect_insert_pending().times(0);
        let mut judge = MockContentJudge::new();
        judge.expect_judge().times(0);

        let svc = service(posts, judge, ModerationPolicy::default());
        let error = assert_err!(svc.submit_post(&alice(), &"a".repeat(501)).await);
        assert!(matches!(error, DomainError::ContentTooLong(501)));
    }

    #[tokio::test]
    async fn boundary_length_is_accepted() {
        let svc = service(echoing_posts(), approving_judge(), ModerationPolicy::default());
        let outcome = assert_ok!(svc.submit_post(&alice(), &"a".repeat(500)).await);
        assert_eq!(outcome.outcome_label(), "approved");
    }

    #[tokio::test]
    async fn blank_content_writes_nothing() {
        let mut posts = MockPostRepository::new();
        posts.expect_insert_pending().times(0);
        let mut judge = MockContentJudge::new();
        judge.expect_judge().times(0);

        let svc = service(posts, judge, ModerationPolicy::default());
        let error = assert_err!(svc.submit_post(&alice(), "   ").await);
        assert!(matches!(error, DomainError::EmptyContent));
    }

    #[tokio::test]
    async fn unknown_author_is_refused_before_insert() {
        let mut posts = MockPostRepository::new();
        posts.expect_insert_pending().times(0);
        let mut judge = MockContentJudge::new();
        judge.expect_judge().times(0);

        let svc = service(posts, judge, ModerationPolicy::default());
        let error = assert_err!(svc.submit_post(&ProfileId::new("mallory"), "hi").await);
        assert!(matches!(error, DomainError::AuthorNotFound(id) if id.as_str() == "mallory"));
    }

    #[tokio::test]
    async fn rejection_carries_messages_and_suggestion() {
        let mut posts = MockPostRepository::new();
        posts.expect_insert_pending().returning(|new| Ok(Post::pending(new)));
        posts
            .expect_transition()
            .withf(|_, transition| {
                matches!(transition, Transition::Reject { rationale } if rationale.len() == 2)
            })
            .times(1)
            .returning(|id, transition| {
                let mut post = Post::pending(NewPost {
                    id,
                    author_id: alice(),
                    content: "ugh".into(),
                    created_at: Utc::now(),
                });
                post.apply(transition);
                Ok(Some(post))
            });

        let mut judge = MockContentJudge::new();
        judge.expect_judge().returning(|_| {
            Ok(Verdict {
                is_approved: false,
                confidence_score: 0.8,
                rejection_reasons: vec![
                    "negative_words_detected: ugh".into(),
                    "made_up_code".into(),
                ],
                suggested_content: Some("Looking forward to a better day!".into()),
            })
        });

        let svc = service(posts, judge, ModerationPolicy::default());
        let outcome = assert_ok!(svc.submit_post(&alice(), "ugh, today").await);
        let Submission::Rejected(rejected) = outcome else {
            panic!("expected a rejection");
        };
        assert!(!rejected.fail_closed);
        assert_eq!(rejected.reasons.len(), 2);
        assert_eq!(rejected.user_messages.len(), 2);
        assert_eq!(rejected.user_messages[1], messages::GENERIC_REASON_MESSAGE);
        assert_eq!(
            rejected.suggested_content.as_deref(),
            Some("Looking forward to a better day!")
        );
    }

    #[tokio::test]
    async fn unreachable_judge_fails_closed() {
        let mut posts = MockPostRepository::new();
        posts.expect_insert_pending().returning(|new| Ok(Post::pending(new)));
        posts
            .expect_transition()
            .withf(|_, transition| {
                matches!(
                    transition,
                    Transition::Reject { rationale } if rationale == &vec![REASON_MODERATION_UNAVAILABLE.to_string()]
                )
            })
            .times(1)
            .returning(|id, transition| {
                let mut post = Post::pending(NewPost {
                    id,
                    author_id: alice(),
                    content: "hi".into(),
                    created_at: Utc::now(),
                });
                post.apply(transition);
                Ok(Some(post))
            });

        let mut judge = MockContentJudge::new();
        judge.expect_judge().returning(|_| Err(JudgeError::Timeout));

        let svc = service(posts, judge, ModerationPolicy::default());
        let outcome = assert_ok!(svc.submit_post(&alice(), "hi").await);
        assert_eq!(outcome.outcome_label(), "fail_closed");
    }

    #[tokio::test]
    async fn override_approves_before_the_judge_answers() {
        let mut seq = Sequence::new();
        let mut posts = MockPostRepository::new();
        posts
            .expect_insert_pending()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|new| Ok(Post::pending(new)));
        posts
            .expect_transition()
            .withf(|_, transition| matches!(transition, Transition::ApproveByOverride { .. }))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, transition| {
                let mut post = Post::pending(NewPost {
                    id,
                    author_id: alice(),
                    content: "meh".into(),
                    created_at: Utc::now(),
                });
                post.apply(transition);
                Ok(Some(post))
            });

        let mut judge = MockContentJudge::new();
        judge.expect_judge().times(1).in_sequence(&mut seq).returning(|_| {
            Ok(Verdict {
                is_approved: false,
                confidence_score: 0.6,
                rejection_reasons: vec!["insufficient_positivity".into()],
                suggested_content: None,
            })
        });
        posts
            .expect_record_verdict()
            .with(
                predicate::always(),
                predicate::eq(false),
                predicate::eq(vec!["insufficient_positivity".to_string()]),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let svc = service(posts, judge, ModerationPolicy { auto_approve: true });
        let outcome = assert_ok!(svc.submit_post(&alice(), "meh").await);
        let Submission::Published(post) = &outcome else {
            panic!("override must publish");
        };
        assert_eq!(post.status(), PostStatus::Approved);
        assert!(post.approved_at().is_some());
        assert_eq!(post.moderation.approval_source(), Some(ApprovalSource::Override));
        assert_eq!(post.moderation_passed, Some(false));
        assert_eq!(outcome.outcome_label(), "approved_override");
    }

    #[tokio::test]
    async fn override_does_not_record_an_unknown_verdict() {
        let mut posts = echoing_posts();
        posts.expect_record_verdict().times(0);
        let mut judge = MockContentJudge::new();
        judge
            .expect_judge()
            .returning(|_| Err(JudgeError::Transport("connection refused".into())));

        let svc = service(posts, judge, ModerationPolicy { auto_approve: true });
        let outcome = assert_ok!(svc.submit_post(&alice(), "hello").await);
        let Submission::Published(post) = outcome else {
            panic!("override must publish");
        };
        assert_eq!(post.moderation_passed, None);
        assert_eq!(post.moderation_rationale, None);
    }

    #[tokio::test]
    async fn override_survives_a_failed_audit_write() {
        let mut posts = echoing_posts();
        posts
            .expect_record_verdict()
            .times(1)
            .returning(|_, _, _| Err(DomainError::Persistence("audit write failed".into())));

        let svc = service(posts, approving_judge(), ModerationPolicy { auto_approve: true });
        let outcome = assert_ok!(svc.submit_post(&alice(), "hello").await);
        let Submission::Published(post) = &outcome else {
            panic!("override must publish");
        };
        assert_eq!(post.status(), PostStatus::Approved);
        assert_eq!(post.moderation_passed, None);
        assert_eq!(outcome.outcome_label(), "approved_override");
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let mut posts = MockPostRepository::new();
        posts
            .expect_insert_pending()
            .returning(|_| Err(DomainError::Persistence("disk full".into())));
        let mut judge = MockContentJudge::new();
        judge.expect_judge().times(0);

        let svc = service(posts, judge, ModerationPolicy::default());
        let error = assert_err!(svc.submit_post(&alice(), "hello").await);
        assert!(matches!(error, DomainError::Persistence(_)));
    }
}
