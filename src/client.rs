use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::decoder;
use crate::error::{TransportError, classify};
use crate::observer::StreamObserver;
use crate::protocol::{InvokeRequest, ResponseBody, SendMessageResult};
use crate::session::{new_message_id, resolve_session_id};
use crate::transport::AgentTransport;

/// Entry point for one conversation surface.
///
/// Holds the transport and a locally generated fallback session id.
/// Switching profiles means constructing a new client over a new
/// transport; there is no shared mutable global.
pub struct ChatClient {
    transport: Arc<dyn AgentTransport>,
    default_session_id: String,
}

impl ChatClient {
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self {
            transport,
            default_session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn default_session_id(&self) -> &str {
        &self.default_session_id
    }

    /// Send one prompt and stream the reply through `observer`.
    ///
    /// Resolves only once streaming fully ends. Every failure is reported
    /// through `on_error` and the returned result; nothing is thrown past
    /// this boundary. Text already delivered through `on_chunk` before a
    /// failure is not rolled back.
    pub async fn send_message_with_streaming(
        &self,
        prompt: &str,
        session_id: Option<&str>,
        observer: &mut dyn StreamObserver,
    ) -> SendMessageResult {
        let message_id = new_message_id();

        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            let error = classify(&TransportError::EmptyPrompt);
            observer.on_error(&error);
            return SendMessageResult::failed(message_id, None, error);
        }

        let request = InvokeRequest {
            prompt: trimmed.to_string(),
            session_id: session_id.unwrap_or(&self.default_session_id).to_string(),
        };

        let started = Instant::now();
        let response = match self.transport.invoke(request).await {
            Ok(response) => response,
            Err(err) => {
                let error = classify(&err);
                observer.on_error(&error);
                return SendMessageResult::failed(message_id, Some(elapsed_ms(started)), error);
            }
        };

        let resolved = resolve_session_id(
            response.session_id.as_deref(),
            session_id,
            &self.default_session_id,
        );

        let decoded = match response.body {
            ResponseBody::Stream(stream) => decoder::decode_stream(stream, observer).await,
            ResponseBody::Buffered(text) => {
                decoder::decode_buffered(&text, observer);
                Ok(())
            }
        };
        let duration_ms = elapsed_ms(started);

        match decoded {
            Ok(()) => SendMessageResult::completed(message_id, resolved, duration_ms),
            Err(err) => {
                let error = classify(&err);
                observer.on_error(&error);
                SendMessageResult::failed(message_id, Some(duration_ms), error)
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
