use chrono::{DateTime, Utc};
use serde::Serialize;

/// Closed taxonomy of failure kinds surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Network,
    Streaming,
    Api,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Network => "network",
            ErrorKind::Streaming => "streaming",
            ErrorKind::Api => "api",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The only error representation that crosses the public contract.
///
/// Created at each failure boundary, handed to `on_error` and attached to
/// the returned result; never raised as a panic or a bare `Err`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorContext {
    pub fn new(
        kind: ErrorKind,
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Failures raised below the public contract.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// Prompt was empty after trimming; rejected before any network call.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// A required configuration value was missing.
    #[error("missing configuration: {0}")]
    Config(String),

    /// The response carried no usable body.
    #[error("response contained no body")]
    MissingBody,

    /// The underlying HTTP call failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered with an error envelope.
    #[error("remote service error {code}: {message}")]
    Service { code: String, message: String },

    /// Reading the response byte stream failed mid-decode.
    #[error("stream read failed: {0}")]
    StreamRead(String),
}

impl TransportError {
    /// Identifying code/name, the input to substring classification.
    pub fn code(&self) -> String {
        match self {
            TransportError::EmptyPrompt => "EmptyPrompt".to_string(),
            TransportError::Config(_) => "MissingConfiguration".to_string(),
            TransportError::MissingBody => "MissingBody".to_string(),
            TransportError::Http(err) if err.is_timeout() => "RequestTimeout".to_string(),
            TransportError::Http(err) if err.is_connect() => "ConnectionFailure".to_string(),
            TransportError::Http(_) => "HttpError".to_string(),
            TransportError::Service { code, .. } => code.clone(),
            TransportError::StreamRead(_) => "StreamReadFailure".to_string(),
        }
    }
}

/// Map a raw failure to its taxonomy entry and a user-readable message.
///
/// Advisory only: classification never changes control flow, it only shapes
/// the `ErrorContext` surfaced to the caller. Unrecognized errors keep their
/// own message under `Unknown`.
pub fn classify(error: &TransportError) -> ErrorContext {
    let code = error.code();
    let (kind, message) = match error {
        TransportError::EmptyPrompt => (
            ErrorKind::Validation,
            "Message cannot be empty.".to_string(),
        ),
        TransportError::Config(_) => (
            ErrorKind::Validation,
            "The chat service is not configured.".to_string(),
        ),
        TransportError::MissingBody | TransportError::StreamRead(_) => (
            ErrorKind::Streaming,
            "The response stream ended unexpectedly.".to_string(),
        ),
        TransportError::Http(err) if err.is_timeout() || err.is_connect() => (
            ErrorKind::Network,
            "Could not reach the assistant service. Check the network connection.".to_string(),
        ),
        TransportError::Http(_) | TransportError::Service { .. } => classify_code(&code, error),
    };

    ErrorContext::new(kind, code, message, Some(error.to_string()))
}

fn classify_code(code: &str, error: &TransportError) -> (ErrorKind, String) {
    if contains_any(
        code,
        &[
            "AccessDenied",
            "Unauthorized",
            "UnrecognizedClient",
            "ExpiredToken",
            "Forbidden",
        ],
    ) {
        (
            ErrorKind::Authentication,
            "Authentication with the assistant service failed.".to_string(),
        )
    } else if contains_any(code, &["Throttling", "TooManyRequests"]) {
        (
            ErrorKind::Api,
            "The assistant is receiving too many requests. Try again shortly.".to_string(),
        )
    } else if contains_any(code, &["ServiceUnavailable", "InternalServer"]) {
        (
            ErrorKind::Api,
            "The assistant service is temporarily unavailable.".to_string(),
        )
    } else if contains_any(code, &["Validation", "BadRequest"]) {
        (
            ErrorKind::Api,
            "The request was rejected by the assistant service.".to_string(),
        )
    } else if contains_any(code, &["ResourceNotFound", "NotFound"]) {
        (
            ErrorKind::Api,
            "The configured assistant could not be found.".to_string(),
        )
    } else if contains_any(code, &["Timeout", "Timed"]) {
        (
            ErrorKind::Network,
            "Could not reach the assistant service. Check the network connection.".to_string(),
        )
    } else {
        (ErrorKind::Unknown, error.to_string())
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prompt_is_validation() {
        let ctx = classify(&TransportError::EmptyPrompt);
        assert_eq!(ctx.kind, ErrorKind::Validation);
        assert_eq!(ctx.code, "EmptyPrompt");
        assert!(!ctx.message.is_empty());
    }

    #[test]
    fn access_denied_is_authentication() {
        let err = TransportError::Service {
            code: "AccessDeniedException".to_string(),
            message: "not allowed".to_string(),
        };
        let ctx = classify(&err);
        assert_eq!(ctx.kind, ErrorKind::Authentication);
        assert_eq!(ctx.code, "AccessDeniedException");
    }

    #[test]
    fn throttling_and_availability_are_api() {
        for code in ["ThrottlingException", "TooManyRequests", "ServiceUnavailable"] {
            let err = TransportError::Service {
                code: code.to_string(),
                message: "slow down".to_string(),
            };
            assert_eq!(classify(&err).kind, ErrorKind::Api, "{code}");
        }
    }

    #[test]
    fn malformed_request_and_missing_resource_are_api() {
        for code in ["ValidationException", "BadRequest", "ResourceNotFoundException"] {
            let err = TransportError::Service {
                code: code.to_string(),
                message: "bad".to_string(),
            };
            assert_eq!(classify(&err).kind, ErrorKind::Api, "{code}");
        }
    }

    #[test]
    fn missing_body_is_streaming() {
        assert_eq!(classify(&TransportError::MissingBody).kind, ErrorKind::Streaming);
        let read = TransportError::StreamRead("connection reset".to_string());
        assert_eq!(classify(&read).kind, ErrorKind::Streaming);
    }

    #[test]
    fn unrecognized_code_falls_back_to_raw_message() {
        let err = TransportError::Service {
            code: "SomethingNovel".to_string(),
            message: "the dial-up modem caught fire".to_string(),
        };
        let ctx = classify(&err);
        assert_eq!(ctx.kind, ErrorKind::Unknown);
        assert!(ctx.message.contains("the dial-up modem caught fire"));
    }

    #[test]
    fn service_timeout_code_is_network() {
        let err = TransportError::Service {
            code: "GatewayTimeout".to_string(),
            message: "upstream timed out".to_string(),
        };
        assert_eq!(classify(&err).kind, ErrorKind::Network);
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ErrorKind::Authentication).unwrap();
        assert_eq!(json, "\"authentication\"");
    }

    #[test]
    fn context_serializes_camel_case() {
        let ctx = classify(&TransportError::EmptyPrompt);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["kind"], "validation");
        assert!(json.get("timestamp").is_some());
    }
}
