use std::sync::Arc;
use std::time::Duration;

use domains::{PostId, ReactionType};
use feed_client::{ClientError, FeedApi, HttpFeedApi, ReactionEngine, SubmitOutcome, TimelineSync};
use integration_tests::{Judgement, ScriptedJudge, TestApp};
use tokio_test::{assert_err, assert_ok};

async fn client_for(app: &TestApp, member: &str) -> Arc<HttpFeedApi> {
    let addr = app.spawn().await;
    Arc::new(HttpFeedApi::new(reqwest::Client::new(), format!("http://{addr}")).with_token(app.token_for(member)))
}

#[tokio::test]
async fn submit_reports_both_outcomes() {
    let app = TestApp::new(ScriptedJudge::new(vec![
        Judgement::Approve,
        Judgement::Reject {
            reasons: vec!["excessive_negativity".into()],
            suggestion: Some("Things will get better.".into()),
        },
    ]));
    let api = client_for(&app, "bob").await;

    match assert_ok!(api.submit_post("A lovely morning").await) {
        SubmitOutcome::Published(post) => assert_eq!(post.content, "A lovely morning"),
        other => panic!("expected a published post, got {other:?}"),
    }

    match assert_ok!(api.submit_post("Everything is terrible").await) {
        SubmitOutcome::Rejected(rejection) => {
            assert_eq!(rejection.rejection_reasons, vec!["excessive_negativity".to_string()]);
            assert_eq!(rejection.suggested_content.as_deref(), Some("Things will get better."));
            assert_eq!(rejection.user_message.len(), 1);
        }
        other => panic!("expected a rejection, got {other:?}"),
    }

    let error = assert_err!(api.submit_post("   ").await);
    assert_eq!(
        error,
        ClientError::Api { status: 400, message: "content must not be empty".into() }
    );
}

#[tokio::test]
async fn anonymous_client_cannot_submit() {
    let app = TestApp::new(ScriptedJudge::approving());
    let addr = app.spawn().await;
    let api = HttpFeedApi::new(reqwest::Client::new(), format!("http://{addr}"));

    assert_eq!(assert_err!(api.submit_post("hello").await), ClientError::Unauthenticated);
}

#[tokio::test]
async fn backfill_then_poll_keeps_one_copy_of_each_post() {
    let app = TestApp::new(ScriptedJudge::approving());
    for i in 0..5 {
        app.publish("alice", &format!("early {i}")).await;
    }
    let api = client_for(&app, "bob").await;
    let sync = TimelineSync::with_options(api, 2, Duration::from_secs(30));

    assert_eq!(assert_ok!(sync.refresh().await), 2);
    while assert_ok!(sync.load_more().await) > 0 {}
    assert_eq!(sync.posts().len(), 5);
    assert!(!sync.cursor().has_next_page);

    for i in 0..3 {
        app.publish("carol", &format!("late {i}")).await;
    }
    assert_eq!(sync.poll_once().await, 3);
    assert_eq!(sync.poll_once().await, 0);

    let contents: Vec<String> = sync.posts().into_iter().map(|view| view.post.content).collect();
    assert_eq!(
        contents,
        vec!["late 2", "late 1", "late 0", "early 4", "early 3", "early 2", "early 1", "early 0"]
    );
    let created: Vec<_> = sync.posts().iter().map(|view| view.post.created_at).collect();
    assert!(created.windows(2).all(|pair| pair[0] > pair[1]));
}

#[tokio::test]
async fn reaction_engine_matches_the_server() {
    let app = TestApp::new(ScriptedJudge::approving());
    let post = app.publish("alice", "hello").await;
    let bob = client_for(&app, "bob").await;
    let carol = client_for(&app, "carol").await;

    assert_ok!(carol.toggle_reaction(post, ReactionType::Support, true).await);

    let engine = ReactionEngine::new(bob.clone(), post);
    assert_eq!(engine.counts().total(), 0);
    assert_ok!(engine.load().await);
    assert_eq!(engine.counts().get(ReactionType::Support), 1);
    assert!(!engine.is_active(ReactionType::Support));

    let outcome = assert_ok!(engine.toggle(ReactionType::Support).await);
    assert!(outcome.active);
    assert_eq!(engine.counts().get(ReactionType::Support), 2);
    assert!(engine.is_active(ReactionType::Support));

    let server = assert_ok!(bob.reaction_summary(post).await);
    assert_eq!(server, engine.summary());
}

#[tokio::test]
async fn failed_toggle_rolls_back() {
    let app = TestApp::new(ScriptedJudge::approving());
    let api = client_for(&app, "bob").await;
    let engine = ReactionEngine::new(api, PostId::generate());

    let error = assert_err!(engine.toggle(ReactionType::Wonderful).await);
    assert!(matches!(error, ClientError::Api { status: 404, .. }));
    assert!(!engine.is_active(ReactionType::Wonderful));
    assert_eq!(engine.counts().get(ReactionType::Wonderful), 0);
}

#[tokio::test]
async fn unreachable_server_is_a_retryable_refresh_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let api = Arc::new(HttpFeedApi::new(reqwest::Client::new(), format!("http://{addr}")));
    let sync = TimelineSync::new(api);

    let error = assert_err!(sync.refresh().await);
    assert!(error.is_retryable(), "{error:?}");
    assert_eq!(sync.poll_once().await, 0);
}
