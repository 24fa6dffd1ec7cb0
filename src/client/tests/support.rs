//! Scripted transport and response builders for client tests.

use std::sync::{ Arc, Mutex };

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use http::{ HeaderMap, HeaderValue, StatusCode };
use serde_json::{ Value, json };
use url::Url;

use crate::client::config::{ ProviderConfig, SESSION_HEADER };
use crate::client::transport::{ Transport, WireRequest, WireResponse };
use crate::errors::Error;
use crate::protocol::ProviderId;
use crate::stream::FrameStream;

/// One recorded POST, as seen by the handler
pub struct MockCall {
    /// JSON-RPC method from the request body
    pub method: String,
    /// Parsed request body
    pub body: Value,
    /// Request headers
    pub headers: HeaderMap,
    /// Zero-based index of this call across the transport's lifetime
    pub index: usize,
}

/// What the handler tells the transport to do
pub enum MockReply {
    /// Answer with this response
    Respond(WireResponse),
    /// Never answer; the POST future stays pending
    Hang,
}

type Handler = dyn Fn(MockCall) -> MockReply + Send + Sync;

/// Transport that answers from a closure and records every method
pub struct MockTransport {
    handler: Box<Handler>,
    methods: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(MockCall) -> MockReply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            methods: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Methods of every request made so far, in order
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }

    /// How many requests used the given method
    pub fn count(&self, method: &str) -> usize {
        self.methods
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, request: WireRequest) -> Result<WireResponse, Error> {
        let body: Value = serde_json::from_str(&request.body).unwrap();
        let method = body["method"].as_str().unwrap_or("").to_string();

        let index = {
            let mut methods = self.methods.lock().unwrap();
            methods.push(method.clone());
            methods.len() - 1
        };

        let call = MockCall { method, body, headers: request.headers, index };
        match (self.handler)(call) {
            MockReply::Respond(response) => Ok(response),
            MockReply::Hang => std::future::pending().await,
        }
    }
}

/// Route client logs through the test writer so failures show them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn test_config(provider: ProviderId) -> ProviderConfig {
    let endpoint = Url::parse("https://mcp.test.invalid/sse").unwrap();
    ProviderConfig::new(provider, endpoint).with_api_key("test-key-0000")
}

fn body_stream(body: String) -> FrameStream {
    Box::pin(stream::iter(vec![Ok(Bytes::from(body))]))
}

/// 200 response whose body is one SSE frame carrying `frame`
pub fn sse_ok(frame: &Value) -> WireResponse {
    WireResponse {
        status: StatusCode::OK,
        headers: HeaderMap::new(),
        frames: body_stream(format!("event: message\ndata: {frame}\n\n")),
    }
}

/// Like [`sse_ok`], with the session token in the response headers
pub fn sse_ok_with_session(frame: &Value, token: &str) -> WireResponse {
    let mut response = sse_ok(frame);
    response.headers.insert(SESSION_HEADER, HeaderValue::from_str(token).unwrap());
    response
}

/// Non-SSE response with an arbitrary status and plain body
pub fn text_response(status: u16, body: &str) -> WireResponse {
    WireResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        frames: body_stream(body.to_string()),
    }
}

/// `initialize` result envelope; `session_in_body` puts the token in
/// `result.sessionId` instead of a header
pub fn init_frame(session_in_body: Option<&str>) -> Value {
    let mut result = json!({
        "protocolVersion": "2025-03-26",
        "serverInfo": { "name": "divination-mcp-server", "version": "2.3.1" }
    });
    if let Some(token) = session_in_body {
        result["sessionId"] = json!(token);
    }
    json!({ "jsonrpc": "2.0", "id": 1, "result": result })
}

/// `tools/call` result envelope carrying one text content item
pub fn tool_frame(id: &Value, text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "content": [{ "type": "text", "text": text }],
            "isError": false
        }
    })
}

/// `tools/list` result envelope
pub fn tools_list_frame(id: &Value, tools: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": { "tools": tools }
    })
}
