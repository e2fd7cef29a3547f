//! # moderation-adapters
//!
//! HTTP client for the external AI moderation service.
//!
//! The service answers `POST {endpoint}` with `{"content": "..."}` and returns
//! a JSON verdict. Anything other than a well-formed verdict is an error;
//! deciding what an error means is left to the caller.

use std::time::Duration;

use async_trait::async_trait;
use domains::{ContentJudge, JudgeError, Verdict};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct JudgeRequest<'a> {
    content: &'a str,
}

/// Fields of the service's answer that matter here. Unknown fields
/// (sentiment scores, timings) are ignored.
#[derive(Deserialize)]
struct JudgeResponse {
    is_approved: bool,
    confidence_score: f64,
    #[serde(default)]
    rejection_reasons: Vec<String>,
    #[serde(default)]
    suggested_content: Option<String>,
}

pub struct HttpContentJudge {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpContentJudge {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, JudgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| JudgeError::Transport(err.to_string()))?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ContentJudge for HttpContentJudge {
    #[tracing::instrument(skip_all, name = "judge.moderate", fields(endpoint = %self.endpoint))]
    async fn judge(&self, content: &str) -> Result<Verdict, JudgeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&JudgeRequest { content })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(JudgeError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        let verdict = parse_verdict(&body)?;
        debug!(
            approved = verdict.is_approved,
            confidence = verdict.confidence_score,
            "verdict received"
        );
        Ok(verdict)
    }
}

fn transport_error(err: reqwest::Error) -> JudgeError {
    if err.is_timeout() {
        JudgeError::Timeout
    } else {
        JudgeError::Transport(err.to_string())
    }
}

/// Decodes and validates a verdict body.
pub fn parse_verdict(body: &[u8]) -> Result<Verdict, JudgeError> {
    let response: JudgeResponse = serde_json::from_slice(body)
        .map_err(|err| JudgeError::MalformedPayload(err.to_string()))?;

    if !(0.0..=1.0).contains(&response.confidence_score) {
        return Err(JudgeError::MalformedPayload(format!(
            "confidence_score {} outside [0, 1]",
            response.confidence_score
        )));
    }

    let suggested_content = response
        .suggested_content
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(Verdict {
        is_approved: response.is_approved,
        confidence_score: response.confidence_score,
        rejection_reasons: response.rejection_reasons,
        suggested_content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn accepts_a_full_verdict() {
        let body = br#"{
            "status": "rejected",
            "is_approved": false,
            "confidence_score": 0.83,
            "bert_scores": {"positive": 0.1, "negative": 0.8, "neutral": 0.1},
            "negative_words": ["awful"],
            "rejection_reasons": ["negative_words_detected: awful"],
            "suggested_content": "  Tomorrow will be better.  ",
            "processing_time_ms": 120.5
        }"#;
        let verdict = assert_ok!(parse_verdict(body));
        assert!(!verdict.is_approved);
        assert_eq!(verdict.rejection_reasons, vec!["negative_words_detected: awful"]);
        assert_eq!(verdict.suggested_content.as_deref(), Some("Tomorrow will be better."));
    }

    #[test]
    fn missing_reasons_default_to_empty() {
        let verdict = assert_ok!(parse_verdict(br#"{"is_approved": true, "confidence_score": 1.0}"#));
        assert!(verdict.is_approved);
        assert!(verdict.rejection_reasons.is_empty());
        assert_eq!(verdict.suggested_content, None);
    }

    #[test]
    fn rejects_malformed_payloads() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"confidence_score": 0.5}"#,
            br#"{"is_approved": "yes", "confidence_score": 0.5}"#,
            br#"{"is_approved": true, "confidence_score": 1.5}"#,
            br#"{"is_approved": true, "confidence_score": 0.5, "rejection_reasons": [1, 2]}"#,
        ];
        for body in cases {
            let error = assert_err!(parse_verdict(body));
            assert!(matches!(error, JudgeError::MalformedPayload(_)), "{error:?}");
        }
    }

    /// Serves exactly one canned HTTP response and returns the endpoint URL.
    async fn one_shot_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/api/v1/moderate")
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let endpoint = one_shot_server(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let judge = HttpContentJudge::new(endpoint, DEFAULT_TIMEOUT).unwrap();
        let error = assert_err!(judge.judge("hello").await);
        assert!(matches!(error, JudgeError::Status(500)));
    }

    #[tokio::test]
    async fn decodes_a_served_verdict() {
        let endpoint = one_shot_server(concat!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 48\r\n",
            "connection: close\r\n\r\n",
            r#"{"is_approved":true,"confidence_score":0.910000}"#
        ))
        .await;
        let judge = HttpContentJudge::new(endpoint, DEFAULT_TIMEOUT).unwrap();
        let verdict = assert_ok!(judge.judge("hello").await);
        assert!(verdict.is_approved);
    }

    #[tokio::test]
    async fn silent_service_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let judge =
            HttpContentJudge::new(format!("http://{addr}/moderate"), Duration::from_millis(100))
                .unwrap();
        let error = assert_err!(judge.judge("hello").await);
        assert!(matches!(error, JudgeError::Timeout), "{error:?}");
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let judge = HttpContentJudge::new(format!("http://{addr}/moderate"), DEFAULT_TIMEOUT).unwrap();
        let error = assert_err!(judge.judge("hello").await);
        assert!(matches!(error, JudgeError::Transport(_)), "{error:?}");
    }
}
