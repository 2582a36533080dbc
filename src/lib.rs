//! Streaming chat core.
//!
//! Forwards a user prompt to a remote agent endpoint and decodes the framed
//! event stream it returns into ordered text chunks. The decoder tolerates
//! arbitrary chunk boundaries, the producer's single-quoted payload
//! encoding, and malformed frames; every send ends with exactly one
//! completion or error callback.

mod client;
mod decoder;
mod error;
mod observer;
mod protocol;
mod session;
mod transport;

pub use client::ChatClient;
pub use decoder::{TOOL_USE_NOTICE, decode_buffered, decode_stream};
pub use error::{ErrorContext, ErrorKind, TransportError, classify};
pub use observer::StreamObserver;
pub use protocol::{
    AgentResponse, BodyStream, InvokePayload, InvokeRequest, ResponseBody, SendMessageResult,
};
pub use session::{Session, new_message_id, resolve_session_id};
pub use transport::{AgentTransport, HttpTransport, SESSION_HEADER, TransportConfig};
