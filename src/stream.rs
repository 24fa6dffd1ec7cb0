//! Stream Decoder
//!
//! Providers answer every POST with a short `text/event-stream` response in
//! which the first event carries the complete JSON-RPC envelope. This module
//! extracts that first frame from the byte stream, tolerating connections
//! that close right after flushing the payload, and then runs the typed
//! two-stage decode: envelope first, then the method-specific result body.

use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use tracing::{ debug, warn };

use crate::errors::Error;
use crate::protocol::envelope;
use crate::protocol::{
    CallToolBody,
    InitializeBody,
    ToolCallResult,
    ToolInfo,
    ToolPayload,
    ToolsListBody,
};

/// A streamed response body, as a sequence of byte chunks
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Read the first SSE frame from a streamed response body.
///
/// Exactly one frame is consumed; once it is complete the rest of the stream
/// is dropped unread, which bounds latency and avoids buffering events no
/// caller will look at.
///
/// Close handling:
/// - connection closes (or errors) before any frame text arrived →
///   [`Error::EmptyStream`] (or the stream error);
/// - connection closes after at least one frame was observed but before the
///   event terminator → the last observed frame is used. Several providers
///   close the socket immediately after flushing the payload.
pub async fn first_frame(mut stream: FrameStream) -> Result<String, Error> {
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                let text = std::str
                    ::from_utf8(&bytes)
                    .map_err(|e| Error::Decode(format!("invalid UTF-8 in stream: {e}")))?;
                buffer.push_str(text);

                if let Some(frame) = complete_frame(&buffer) {
                    debug!(bytes = frame.len(), "consumed first stream frame");
                    return Ok(frame);
                }
            }
            Err(e) => {
                // Premature close tolerance: recover whatever already arrived.
                if let Some(frame) = partial_frame(&buffer) {
                    warn!("stream closed mid-frame ({e}); using last observed frame");
                    return Ok(frame);
                }
                return Err(e);
            }
        }
    }

    if let Some(frame) = partial_frame(&buffer) {
        warn!("stream ended without event terminator; using last observed frame");
        return Ok(frame);
    }

    Err(Error::EmptyStream)
}

/// First newline-terminated payload line, if one is buffered
fn complete_frame(buffer: &str) -> Option<String> {
    for line in buffer.split_inclusive('\n') {
        if !line.ends_with('\n') {
            // Incomplete tail; wait for more bytes.
            break;
        }
        if let Some(payload) = frame_payload(line) {
            return Some(payload);
        }
    }
    None
}

/// Last payload line observed so far, terminated or not
fn partial_frame(buffer: &str) -> Option<String> {
    buffer.lines().filter_map(frame_payload).last()
}

/// Strip SSE field framing from one line; `None` for blanks, comments and
/// `event:` markers.
fn frame_payload(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
        return None;
    }
    let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

/// Recover the JSON payload from a fully-buffered response body that may or
/// may not be SSE-framed. Used for handshake responses, which some providers
/// send as plain JSON and others as a single event.
pub fn unwrap_sse_text(body: &str) -> String {
    let has_framing = body
        .lines()
        .any(|line| line.trim_start().starts_with("data:"));
    if !has_framing {
        return body.trim().to_string();
    }

    let mut payload = String::new();
    for line in body.lines() {
        if let Some(data) = line.trim_start().strip_prefix("data:") {
            if !payload.is_empty() {
                payload.push('\n');
            }
            payload.push_str(data.trim());
        }
    }
    payload
}

/// Decode a `tools/call` response frame into a [`ToolCallResult`].
///
/// Application-level failures (`result.isError == true`) come back as
/// `Ok(ToolCallResult { success: false, .. })`, so callers must check
/// `success`. Only envelope-level and structural problems are errors.
pub fn decode_tool_response(frame: &str) -> Result<ToolCallResult, Error> {
    let response = envelope::parse_envelope(frame)?;
    let result = response.result.ok_or_else(|| Error::Decode("missing result".to_string()))?;

    let body: CallToolBody = serde_json
        ::from_value(result)
        .map_err(|e| Error::Decode(format!("malformed tool result: {e}")))?;

    if body.is_error {
        let message = body.content
            .first()
            .and_then(|item| item.text.clone())
            .unwrap_or_else(|| "server returned unspecified error".to_string());
        return Ok(ToolCallResult::failure(message, frame));
    }

    let text = body.content
        .first()
        .and_then(|item| item.text.as_deref())
        .ok_or_else(|| Error::Decode("missing content".to_string()))?;

    Ok(ToolCallResult::ok(ToolPayload::parse(text).into_value(), frame))
}

/// Decode a `tools/list` response frame into the advertised tools.
///
/// An absent `tools` array decodes to an empty list, never a partial one.
pub fn decode_tools_list(frame: &str) -> Result<Vec<ToolInfo>, Error> {
    let response = envelope::parse_envelope(frame)?;
    let result = response.result.ok_or_else(|| Error::Decode("missing result".to_string()))?;

    let body: ToolsListBody = serde_json
        ::from_value(result)
        .map_err(|e| Error::Decode(format!("malformed tools list: {e}")))?;

    debug!(count = body.tools.len(), "decoded tools list");
    Ok(body.tools)
}

/// Decode an `initialize` response body (plain JSON or a single SSE event).
pub fn decode_initialize(body: &str) -> Result<InitializeBody, Error> {
    let payload = unwrap_sse_text(body);
    if payload.is_empty() {
        return Err(Error::Decode("empty initialize response".to_string()));
    }

    let response = envelope::parse_envelope(&payload)?;
    let result = response.result.ok_or_else(|| Error::Decode("missing result".to_string()))?;

    serde_json
        ::from_value(result)
        .map_err(|e| Error::Decode(format!("malformed initialize result: {e}")))
}
