use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

use crate::error::TransportError;
use crate::protocol::{AgentResponse, InvokePayload, InvokeRequest, ResponseBody};

/// Header carrying the session identifier in both directions.
pub const SESSION_HEADER: &str = "x-agent-session-id";

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one adapter instance. Attempts and timeout are
/// fixed here, not per call.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint: String,
    /// Target resource identifier of the remote agent.
    pub agent_id: String,
    /// Fixed qualifier/version selector, reused on every call.
    pub agent_alias: String,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(
        endpoint: impl Into<String>,
        agent_id: impl Into<String>,
        agent_alias: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            agent_id: agent_id.into(),
            agent_alias: agent_alias.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read the connection settings from the environment. A `.env` file is
    /// honored when present.
    pub fn from_env() -> Result<Self, TransportError> {
        dotenvy::dotenv().ok();

        let endpoint = require_var("CHATSTREAM_ENDPOINT")?;
        let agent_id = require_var("CHATSTREAM_AGENT_ID")?;
        let agent_alias = std::env::var("CHATSTREAM_AGENT_ALIAS")
            .unwrap_or_else(|_| "live".to_string());

        Ok(Self::new(endpoint, agent_id, agent_alias))
    }
}

fn require_var(name: &str) -> Result<String, TransportError> {
    std::env::var(name).map_err(|_| TransportError::Config(name.to_string()))
}

/// Issues the remote invoke call and normalizes the response body into the
/// tagged `ResponseBody` union.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn invoke(&self, request: InvokeRequest) -> Result<AgentResponse, TransportError>;
}

/// Production transport over HTTP.
pub struct HttpTransport {
    config: TransportConfig,
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let http = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn invoke_url(&self) -> String {
        format!(
            "{}/agents/{}/aliases/{}/invoke",
            self.config.endpoint, self.config.agent_id, self.config.agent_alias
        )
    }

    /// Bounded transport-level attempts; connect and timeout failures retry,
    /// everything else is final. Remote error envelopes are never retried.
    async fn send_with_retries(
        &self,
        request: &InvokeRequest,
    ) -> Result<reqwest::Response, TransportError> {
        let payload = InvokePayload {
            prompt: request.prompt.clone(),
        };

        let mut attempt = 1;
        loop {
            let result = self
                .http
                .post(self.invoke_url())
                .header(SESSION_HEADER, &request.session_id)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.config.max_attempts
                    && (err.is_timeout() || err.is_connect()) =>
                {
                    tracing::warn!(attempt, error = %err, "transport attempt failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(TransportError::Http(err)),
            }
        }
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    async fn invoke(&self, request: InvokeRequest) -> Result<AgentResponse, TransportError> {
        let response = self.send_with_retries(&request).await?;
        let status = response.status();
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(service_error(status, &body));
        }

        let streaming = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));

        let body = if streaming {
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|err| TransportError::StreamRead(err.to_string())))
                .boxed();
            ResponseBody::Stream(stream)
        } else {
            let text = response.text().await?;
            if text.trim().is_empty() {
                return Err(TransportError::MissingBody);
            }
            ResponseBody::Buffered(text)
        };

        Ok(AgentResponse { session_id, body })
    }
}

/// Lift the remote error code out of the body when it is JSON-shaped,
/// falling back to the status line.
fn service_error(status: StatusCode, body: &str) -> TransportError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let code = parsed
        .as_ref()
        .and_then(|value| value.get("__type").or_else(|| value.get("code")))
        .and_then(|code| code.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("HttpError")
                .replace(' ', "")
        });

    let message = parsed
        .as_ref()
        .and_then(|value| value.get("message"))
        .and_then(|message| message.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("status {status}"));

    TransportError::Service { code, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_strips_trailing_slash() {
        let config = TransportConfig::new("https://agents.example.com/", "agent-1", "live");
        assert_eq!(config.endpoint, "https://agents.example.com");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn invoke_url_includes_resource_and_qualifier() {
        let transport =
            HttpTransport::new(TransportConfig::new("https://x.test", "agent-9", "prod")).unwrap();
        assert_eq!(
            transport.invoke_url(),
            "https://x.test/agents/agent-9/aliases/prod/invoke"
        );
    }

    #[test]
    fn service_error_prefers_body_code() {
        let err = service_error(
            StatusCode::FORBIDDEN,
            r#"{"__type": "AccessDeniedException", "message": "no"}"#,
        );
        match err {
            TransportError::Service { code, message } => {
                assert_eq!(code, "AccessDeniedException");
                assert_eq!(message, "no");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn service_error_falls_back_to_status_line() {
        let err = service_error(StatusCode::TOO_MANY_REQUESTS, "plain text body");
        match err {
            TransportError::Service { code, .. } => assert_eq!(code, "TooManyRequests"),
            other => panic!("expected service error, got {other:?}"),
        }
    }
}
