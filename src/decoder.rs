use std::sync::OnceLock;

use futures::StreamExt;
use regex::Regex;

use crate::error::TransportError;
use crate::observer::StreamObserver;
use crate::protocol::BodyStream;

/// Notice delivered through `on_chunk` when the remote agent pauses text
/// generation to invoke an external tool before resuming.
pub const TOOL_USE_NOTICE: &str = "Looking up additional information...";

const FRAME_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";

/// Incremental path: pull byte chunks, reassemble frames, process in order.
///
/// The buffer accumulates decoded text; every complete frame (delimited by
/// a blank line) is processed as soon as it is available, and the residue
/// carries over to the next pull. Producers may omit the trailing
/// delimiter, so a non-empty residue at end-of-data is processed as one
/// final frame.
///
/// Invokes `on_complete` exactly once after end-of-data. A stream read
/// failure returns the error without a completion callback; the caller
/// surfaces it as the terminal error.
pub async fn decode_stream(
    mut stream: BodyStream,
    observer: &mut dyn StreamObserver,
) -> Result<(), TransportError> {
    let mut utf8 = Utf8Accumulator::new();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.push_str(&utf8.decode(&chunk));

        while let Some(idx) = buffer.find(FRAME_DELIMITER) {
            let frame = buffer[..idx].to_string();
            buffer = buffer[idx + FRAME_DELIMITER.len()..].to_string();
            process_frame(&frame, observer);
        }
    }

    buffer.push_str(&utf8.finish());
    if !buffer.trim().is_empty() {
        process_frame(&buffer, observer);
    }

    observer.on_complete();
    Ok(())
}

/// Buffered path: the whole response body arrived as one text blob.
pub fn decode_buffered(text: &str, observer: &mut dyn StreamObserver) {
    for frame in text.split(FRAME_DELIMITER) {
        if frame.trim().is_empty() {
            continue;
        }
        process_frame(frame, observer);
    }
    observer.on_complete();
}

/// Shared per-frame logic for both paths.
///
/// A frame without a `data: ` line is skipped. A recognized text delta and
/// a tool-use stop signal are independent; both may fire from one frame.
/// Anything unrecognized is logged and dropped, never fatal.
fn process_frame(frame: &str, observer: &mut dyn StreamObserver) {
    let Some(payload) = frame
        .lines()
        .find_map(|line| line.strip_prefix(DATA_PREFIX))
    else {
        return;
    };

    let delta = extract_delta(payload);
    if let Some(text) = &delta {
        observer.on_chunk(text);
    }

    let tool_use = signals_tool_use(payload);
    if tool_use {
        observer.on_chunk(TOOL_USE_NOTICE);
    }

    if delta.is_none() && !tool_use {
        tracing::debug!(payload_len = payload.len(), "dropping unrecognized frame payload");
    }
}

/// Pull the text delta out of one frame's data payload.
///
/// The producer's payload is dictionary-like text with single-quoted keys
/// and strings, not standard JSON, so the primary extraction is a tolerant
/// structural match. When that misses, the payload is parsed as strict
/// JSON and searched generically for a `contentBlockDelta.text` field
/// (serde has already decoded escapes on that path).
fn extract_delta(payload: &str) -> Option<String> {
    if let Some(captures) = delta_pattern().captures(payload) {
        return Some(unescape(&captures[1]));
    }

    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    find_text_delta(&value).map(str::to_string)
}

fn find_text_delta(value: &serde_json::Value) -> Option<&str> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(text) = map
                .get("contentBlockDelta")
                .and_then(|delta| delta.get("text"))
                .and_then(|text| text.as_str())
            {
                return Some(text);
            }
            map.values().find_map(find_text_delta)
        }
        serde_json::Value::Array(items) => items.iter().find_map(find_text_delta),
        _ => None,
    }
}

fn signals_tool_use(payload: &str) -> bool {
    stop_pattern().is_match(payload)
}

fn delta_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"'contentBlockDelta'\s*:\s*\{[^{}]*'text'\s*:\s*'((?:\\.|[^'\\])*)'")
            .expect("delta pattern compiles")
    })
}

fn stop_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"['"]stopReason['"]\s*:\s*['"]tool_use['"]"#).expect("stop pattern compiles")
    })
}

/// Decode the producer's backslash sequences in a single pass.
///
/// `\n`, `\t`, `\'` and `\"` become the literal control/quote characters;
/// `\\` collapses to one backslash, so doubled escapes survive as text
/// rather than being decoded twice. Unknown sequences pass through intact.
fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Streaming UTF-8 decoder.
///
/// Incomplete multi-byte suffixes carry over to the next chunk; genuinely
/// invalid sequences decode to U+FFFD and never abort the stream.
struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    fn new() -> Self {
        Self { pending: Vec::new() }
    }

    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::new();
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        Some(len) => {
                            out.push('\u{FFFD}');
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Drain whatever is still pending at end-of-data. A suffix that never
    /// completed is decoded lossily rather than dropped.
    fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned()
        }
    }
}
