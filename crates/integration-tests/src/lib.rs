//! # integration-tests
//!
//! Shared harness: the real router over [`MemoryStore`], a JWT verifier and
//! a scripted judge. Each file under `tests/` drives it end to end.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use api_adapters::state::Ports;
use api_adapters::{router, AppState};
use async_trait::async_trait;
use auth_adapters::JwtVerifier;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use domains::{ContentJudge, JudgeError, PostId, Profile, ProfileId, Verdict};
use serde_json::Value;
use services::{ModerationPolicy, SystemClock};
use storage_adapters::MemoryStore;
use tower::ServiceExt;

pub const ISSUER: &str = "sanctuary-tests";
const SECRET: &[u8] = b"integration-test-secret-of-decent-length";

/// Members seeded into every test store.
pub const MEMBERS: [&str; 3] = ["alice", "bob", "carol"];

/// What the judge answers next. The last script entry repeats.
#[derive(Debug, Clone)]
pub enum Judgement {
    Approve,
    Reject { reasons: Vec<String>, suggestion: Option<String> },
    Unavailable,
}

impl Judgement {
    pub fn reject(reasons: &[&str]) -> Self {
        Self::Reject { reasons: reasons.iter().map(|r| r.to_string()).collect(), suggestion: None }
    }
}

pub struct ScriptedJudge {
    script: Mutex<Vec<Judgement>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedJudge {
    pub fn new(script: Vec<Judgement>) -> Self {
        Self { script: Mutex::new(script), calls: Mutex::new(Vec::new()) }
    }

    pub fn approving() -> Self {
        Self::new(vec![Judgement::Approve])
    }

    /// Content the judge was asked about, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentJudge for ScriptedJudge {
    async fn judge(&self, content: &str) -> Result<Verdict, JudgeError> {
        self.calls.lock().unwrap().push(content.to_string());
        let next = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().cloned().unwrap_or(Judgement::Approve)
            }
        };
        match next {
            Judgement::Approve => Ok(Verdict {
                is_approved: true,
                confidence_score: 0.92,
                rejection_reasons: vec![],
                suggested_content: None,
            }),
            Judgement::Reject { reasons, suggestion } => Ok(Verdict {
                is_approved: false,
                confidence_score: 0.81,
                rejection_reasons: reasons,
                suggested_content: suggestion,
            }),
            Judgement::Unavailable => Err(JudgeError::Timeout),
        }
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub judge: Arc<ScriptedJudge>,
    pub state: AppState,
    verifier: Arc<JwtVerifier>,
    router: Router,
}

impl TestApp {
    pub fn new(judge: ScriptedJudge) -> Self {
        Self::with_policy(judge, ModerationPolicy::default())
    }

    pub fn with_policy(judge: ScriptedJudge, policy: ModerationPolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        for member in MEMBERS {
            store.insert_profile(Profile {
                id: ProfileId::new(member),
                nickname: member.to_string(),
                avatar_url: None,
            });
        }
        let judge = Arc::new(judge);
        let verifier = Arc::new(JwtVerifier::new(SECRET, ISSUER));

        let state = AppState::new(
            Ports {
                posts: store.clone(),
                profiles: store.clone(),
                reactions: store.clone(),
                judge: judge.clone(),
                identity: verifier.clone(),
                clock: Arc::new(SystemClock::new()),
            },
            policy,
        );
        let router = router(state.clone());
        Self { store, judge, state, verifier, router }
    }

    pub fn token_for(&self, member: &str) -> String {
        self.verifier
            .sign(&ProfileId::new(member), chrono::Duration::hours(1))
            .expect("test token")
    }

    pub fn expired_token_for(&self, member: &str) -> String {
        self.verifier
            .sign(&ProfileId::new(member), chrono::Duration::hours(-1))
            .expect("test token")
    }

    /// Sends one request through the router. Empty bodies come back as
    /// `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self.router.clone().oneshot(request).await.expect("infallible router");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn get_as(&self, member: &str, uri: &str) -> (StatusCode, Value) {
        let token = self.token_for(member);
        self.request(Method::GET, uri, Some(&token), None).await
    }

    pub async fn post_as(&self, member: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let token = self.token_for(member);
        self.request(Method::POST, uri, Some(&token), Some(body)).await
    }

    /// Submits a post that the judge is expected to approve.
    pub async fn publish(&self, member: &str, content: &str) -> PostId {
        let (status, body) =
            self.post_as(member, "/api/posts", serde_json::json!({ "content": content })).await;
        assert_eq!(status, StatusCode::CREATED, "publish failed: {body}");
        serde_json::from_value(body["post"]["id"].clone()).expect("post id")
    }

    /// Serves the router on an ephemeral local port.
    pub async fn spawn(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server");
        });
        addr
    }
}
