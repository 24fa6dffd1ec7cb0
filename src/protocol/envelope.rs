//! Envelope Codec
//!
//! Builders for the four canonical JSON-RPC request bodies sent to every
//! provider, and the symmetric parser for response envelopes. The builders
//! produce [`RequestEnvelope`] values; serialization happens once, in
//! [`RequestEnvelope::to_json`].

use serde_json::{ json, Map, Value };

use crate::errors::Error;
use super::{
    RequestEnvelope,
    ResponseEnvelope,
    CLIENT_VERSION,
    INITIALIZE_REQUEST_ID,
    JSONRPC_VERSION,
    METHOD_INITIALIZE,
    METHOD_INITIALIZED,
    METHOD_TOOLS_CALL,
    METHOD_TOOLS_LIST,
};

/// Build the `initialize` handshake request (always id 1)
pub fn initialize_request(protocol_version: &str, client_name: &str) -> RequestEnvelope {
    RequestEnvelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: Some(INITIALIZE_REQUEST_ID),
        method: METHOD_INITIALIZE.to_string(),
        params: json!({
            "protocolVersion": protocol_version,
            "capabilities": {},
            "clientInfo": {
                "name": client_name,
                "version": CLIENT_VERSION,
            },
        }),
    }
}

/// Build the `notifications/initialized` notification (no id)
pub fn initialized_notification() -> RequestEnvelope {
    RequestEnvelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: None,
        method: METHOD_INITIALIZED.to_string(),
        params: json!({}),
    }
}

/// Build a `tools/list` request
pub fn tools_list_request(id: i64) -> RequestEnvelope {
    RequestEnvelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: Some(id),
        method: METHOD_TOOLS_LIST.to_string(),
        params: json!({ "_meta": { "progressToken": 0 } }),
    }
}

/// Build a `tools/call` request.
///
/// `args` defaults to an empty object when absent, matching what the
/// providers expect for argument-less tools.
pub fn tool_call_request(id: i64, tool_name: &str, args: Option<Value>) -> RequestEnvelope {
    let arguments = args.unwrap_or_else(|| Value::Object(Map::new()));
    RequestEnvelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: Some(id),
        method: METHOD_TOOLS_CALL.to_string(),
        params: json!({
            "name": tool_name,
            "arguments": arguments,
            "_meta": { "progressToken": 0 },
        }),
    }
}

/// Parse a raw response body into a [`ResponseEnvelope`].
///
/// If the envelope carries the `error` field this fails with
/// [`Error::Protocol`] immediately, without inspecting `result`.
pub fn parse_envelope(raw: &str) -> Result<ResponseEnvelope, Error> {
    let envelope: ResponseEnvelope = serde_json
        ::from_str(raw)
        .map_err(|e| Error::Decode(format!("malformed response envelope: {e}")))?;

    if let Some(error) = &envelope.error {
        return Err(Error::Protocol(render_rpc_error(error)));
    }

    Ok(envelope)
}

/// Render the provider's `error` field for humans; providers return both
/// `{code, message}` objects and bare strings here.
fn render_rpc_error(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(fields) => {
            let message = fields
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified error");
            match fields.get("code").and_then(Value::as_i64) {
                Some(code) => format!("{message} (code {code})"),
                None => message.to_string(),
            }
        }
        other => other.to_string(),
    }
}
