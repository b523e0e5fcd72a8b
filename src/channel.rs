use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::{Credentials, Endpoint};
use crate::error::ChannelError;
use crate::session::Session;

/// Returned when the service answers without an `output` field.
pub const NO_MESSAGE: &str = "[no message from AI]";

#[async_trait]
pub trait AiChannel: Send + Sync {
    /// Sends one prompt and returns the textual reply.
    async fn send(&self, prompt: &str) -> Result<String, ChannelError>;
}

#[derive(Debug, Serialize)]
struct PromptPayload<'a> {
    prompt_msg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

/// JSON-over-HTTP channel to the remote AI workflow.
pub struct HttpChannel {
    http: Client,
    endpoint: Endpoint,
    session: Option<Session>,
    timeout: Duration,
}

impl HttpChannel {
    pub fn new(endpoint: Endpoint, session: Option<Session>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("shellmate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for the AI service")?;

        Ok(Self {
            http,
            endpoint,
            session,
            timeout,
        })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn classify(&self, err: reqwest::Error) -> ChannelError {
        if err.is_timeout() {
            ChannelError::Timeout(self.timeout.as_secs())
        } else {
            ChannelError::Network(error_chain(&err))
        }
    }
}

#[async_trait]
impl AiChannel for HttpChannel {
    async fn send(&self, prompt: &str) -> Result<String, ChannelError> {
        let payload = PromptPayload {
            prompt_msg: prompt,
            session_id: self.session.as_ref().map(Session::id),
        };

        debug!(url = %self.endpoint.url, chars = prompt.chars().count(), "sending prompt");

        let mut request = self.http.post(self.endpoint.url.clone()).json(&payload);
        if let Some(Credentials { username, password }) = &self.endpoint.credentials {
            request = request.basic_auth(username, password.as_ref());
        }

        let response = request.send().await.map_err(|err| self.classify(err))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| self.classify(err))?;

        if status != reqwest::StatusCode::OK {
            debug!(status = status.as_u16(), "AI service rejected the request");
            return Err(ChannelError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        // Any JSON value is accepted; only the `output` member of an object counts.
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|_| ChannelError::MalformedResponse { body: body.clone() })?;

        let reply = match parsed.get("output") {
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => NO_MESSAGE.to_string(),
            Some(other) => other.to_string(),
        };

        debug!(chars = reply.chars().count(), "received reply");
        Ok(reply)
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel_for(server: &MockServer, auth: Option<&str>, session: Option<&str>) -> HttpChannel {
        let config = Config {
            host: Some("127.0.0.1".into()),
            port: Some(server.address().port()),
            path: Some("/webhook/chat".into()),
            auth: auth.map(str::to_string),
            ..Default::default()
        };
        HttpChannel::new(
            config.endpoint().unwrap(),
            session.map(|id| Session::resolve(Some(id))),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_prompt_with_session_and_returns_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/chat"))
            .and(body_json(json!({"prompt_msg": "hello", "session_id": "abc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "hi there"})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = channel_for(&server, None, Some("abc")).send("hello").await.unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn omits_session_when_unscoped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"prompt_msg": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = channel_for(&server, None, None).send("hello").await.unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn sends_basic_auth_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "authed"})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = channel_for(&server, Some("user:pass"), None)
            .send("hello")
            .await
            .unwrap();
        assert_eq!(reply, "authed");
    }

    #[tokio::test]
    async fn missing_output_yields_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"other": 1})))
            .mount(&server)
            .await;

        let reply = channel_for(&server, None, None).send("hello").await.unwrap();
        assert_eq!(reply, NO_MESSAGE);
    }

    #[tokio::test]
    async fn json_without_an_object_yields_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1,2,3]"))
            .mount(&server)
            .await;

        let channel = channel_for(&server, None, None);
        assert_eq!(channel.send("hello").await.unwrap(), NO_MESSAGE);
    }

    #[tokio::test]
    async fn structured_output_is_forwarded_as_json_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": {"n": 1}})))
            .mount(&server)
            .await;

        let reply = channel_for(&server, None, None).send("hello").await.unwrap();
        assert_eq!(reply, r#"{"n":1}"#);
    }

    #[tokio::test]
    async fn non_200_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
            .mount(&server)
            .await;

        let err = channel_for(&server, None, None).send("hello").await.unwrap_err();
        match err {
            ChannelError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "workflow crashed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = channel_for(&server, None, None).send("hello").await.unwrap_err();
        assert!(matches!(err, ChannelError::MalformedResponse { ref body } if body.contains("nope")));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"output": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = Config {
            host: Some("127.0.0.1".into()),
            port: Some(server.address().port()),
            ..Default::default()
        };
        let channel =
            HttpChannel::new(config.endpoint().unwrap(), None, Duration::from_millis(200)).unwrap();

        let err = channel.send("hello").await.unwrap_err();
        assert!(matches!(err, ChannelError::Timeout(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config {
            host: Some("127.0.0.1".into()),
            port: Some(port),
            ..Default::default()
        };
        let channel =
            HttpChannel::new(config.endpoint().unwrap(), None, Duration::from_secs(5)).unwrap();

        let err = channel.send("hello").await.unwrap_err();
        assert!(matches!(err, ChannelError::Network(_)));
    }
}
