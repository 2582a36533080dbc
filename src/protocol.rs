use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, TransportError};

/// Fixed-shape payload object carried as the JSON request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvokePayload {
    pub prompt: String,
}

/// One invocation of the remote agent. The prompt is trimmed and non-empty
/// by the time a request is constructed.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub prompt: String,
    pub session_id: String,
}

/// Byte stream yielded by a streaming response body.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Response body shape, decided exactly once when the response is received
/// and never re-probed afterwards.
pub enum ResponseBody {
    /// Incrementally readable byte stream.
    Stream(BodyStream),
    /// Fully pre-buffered text blob.
    Buffered(String),
}

/// What the transport hands back for one invocation.
pub struct AgentResponse {
    /// Session identifier echoed by the remote side, if any.
    pub session_id: Option<String>,
    pub body: ResponseBody,
}

/// Outcome of one send operation, returned once streaming fully ends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResult {
    pub success: bool,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorContext>,
}

impl SendMessageResult {
    pub(crate) fn completed(message_id: String, session_id: String, duration_ms: u64) -> Self {
        Self {
            success: true,
            message_id,
            session_id: Some(session_id),
            duration_ms: Some(duration_ms),
            error: None,
        }
    }

    pub(crate) fn failed(
        message_id: String,
        duration_ms: Option<u64>,
        error: ErrorContext,
    ) -> Self {
        Self {
            success: false,
            message_id,
            session_id: None,
            duration_ms,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, TransportError};

    #[test]
    fn completed_result_has_no_error() {
        let result = SendMessageResult::completed("msg-1".to_string(), "sess-1".to_string(), 12);
        assert!(result.success);
        assert_eq!(result.session_id.as_deref(), Some("sess-1"));
        assert_eq!(result.duration_ms, Some(12));
        assert!(result.error.is_none());
    }

    #[test]
    fn failed_result_serializes_without_session_fields() {
        let error = classify(&TransportError::EmptyPrompt);
        let result = SendMessageResult::failed("msg-2".to_string(), None, error);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["messageId"], "msg-2");
        assert!(json.get("sessionId").is_none());
        assert!(json.get("durationMs").is_none());
        assert_eq!(json["error"]["kind"], "validation");
    }
}
