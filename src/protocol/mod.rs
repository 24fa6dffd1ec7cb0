//! MCP Wire Protocol Types
//!
//! This module defines the JSON-RPC 2.0 envelope types exchanged with the
//! remote divination tool providers, the typed result bodies extracted from
//! them, and the provider identifiers. Envelope construction and parsing
//! helpers live in [`envelope`].

use serde::{ Deserialize, Serialize };
use serde_json::{ json, Value };
use std::fmt;

pub mod envelope;

/// JSON-RPC version marker used on every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved request id for the `initialize` handshake.
///
/// The per-client request-id counter starts above this value and never
/// allocates it again, so ordinary calls can never collide with a retried
/// handshake.
pub const INITIALIZE_REQUEST_ID: i64 = 1;

/// Version reported in `clientInfo` on the handshake
pub const CLIENT_VERSION: &str = "1.0.0";

/// `initialize` method name
pub const METHOD_INITIALIZE: &str = "initialize";
/// `notifications/initialized` method name
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
/// `tools/list` method name
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// `tools/call` method name
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// The five remote divination tool providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// Four-pillar (bazi) chart provider
    Bazi,
    /// Yijing hexagram provider
    Yijing,
    /// Western astrology / zodiac provider
    Star,
    /// Tarot reading provider
    Tarot,
    /// Ziwei doushu chart provider
    Ziwei,
}

impl ProviderId {
    /// All providers, in the order they are configured at startup
    pub const ALL: [ProviderId; 5] = [
        ProviderId::Bazi,
        ProviderId::Yijing,
        ProviderId::Star,
        ProviderId::Tarot,
        ProviderId::Ziwei,
    ];

    /// Lowercase identifier used in configuration keys and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Bazi => "bazi",
            ProviderId::Yijing => "yijing",
            ProviderId::Star => "star",
            ProviderId::Tarot => "tarot",
            ProviderId::Ziwei => "ziwei",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound JSON-RPC request or notification envelope
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Always [`JSONRPC_VERSION`]
    pub jsonrpc: String,
    /// Request id; `None` for notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// JSON-RPC method name
    pub method: String,
    /// Structured parameters
    pub params: Value,
}

impl RequestEnvelope {
    /// Serialize the envelope to its wire form
    pub fn to_json(&self) -> Result<String, crate::errors::Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Inbound JSON-RPC response envelope.
///
/// Parsed leniently: providers are not consistent about which fields they
/// include (or the shape of `error`), so everything is optional and the
/// second decode stage interprets `result` per method.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    /// Version marker, when present
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Echoed request id (number or string depending on provider)
    #[serde(default)]
    pub id: Option<Value>,
    /// Successful result payload
    #[serde(default)]
    pub result: Option<Value>,
    /// Envelope-level error; providers return both objects and bare strings
    #[serde(default)]
    pub error: Option<Value>,
}

/// `tools/call` result body (second decode stage)
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolBody {
    /// Content items; the first text item carries the tool output
    #[serde(default)]
    pub content: Vec<ContentItem>,
    /// Application-level error channel, distinct from the envelope `error`
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

/// One item of a `tools/call` content array
#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    /// Content kind, normally `"text"`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Text payload (JSON or prose, provider-dependent)
    #[serde(default)]
    pub text: Option<String>,
}

/// `tools/list` result body
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsListBody {
    /// Advertised tools; absent is treated as empty
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
}

/// One advertised tool from `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Unique tool name
    pub name: String,
    /// Description of what the tool does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the tool arguments
    #[serde(default, rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// `initialize` result body
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeBody {
    /// Session id, when the provider returns it in the body
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
    /// Provider's self-description
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
    /// Protocol version the provider settled on
    #[serde(default, rename = "protocolVersion")]
    pub protocol_version: Option<String>,
}

/// Provider identity advertised during the handshake
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    /// Server name
    #[serde(default)]
    pub name: Option<String>,
    /// Server version
    #[serde(default)]
    pub version: Option<String>,
}

/// The text payload of a tool response, after the typed decode stage.
///
/// Providers return either a JSON document or free-form prose in
/// `content[0].text`; callers always receive a structured value, so `Raw`
/// text is wrapped as `{"text": ...}` by [`ToolPayload::into_value`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    /// The text parsed as a JSON document
    Structured(Value),
    /// The text as-is; not valid JSON
    Raw(String),
}

impl ToolPayload {
    /// Classify a content text as structured JSON or raw prose
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => ToolPayload::Structured(value),
            Err(_) => ToolPayload::Raw(text.to_string()),
        }
    }

    /// Convert into the structured value handed to callers
    pub fn into_value(self) -> Value {
        match self {
            ToolPayload::Structured(value) => value,
            ToolPayload::Raw(text) => json!({ "text": text }),
        }
    }
}

/// The value returned to callers of `call_tool`.
///
/// Application-level failures (`result.isError == true`) are reported here
/// with `success == false` rather than raised as an error, so callers can
/// render a user-facing message without special-casing.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    /// Whether the tool ran successfully
    pub success: bool,
    /// Structured tool output; `None` on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The raw response envelope, kept for diagnostics
    pub raw: String,
    /// Provider-supplied error message when `success == false`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolCallResult {
    /// Build a successful result
    pub fn ok(data: Value, raw: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            raw: raw.into(),
            error_message: None,
        }
    }

    /// Build an application-level failure
    pub fn failure(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            raw: raw.into(),
            error_message: Some(message.into()),
        }
    }
}
