//! Divination MCP Client
//!
//! Client layer for five remote divination tool providers (bazi, yijing,
//! star, tarot, ziwei) that speak JSON-RPC 2.0 over HTTP with
//! `text/event-stream` responses. The crate hides the wire protocol behind
//! typed calls: session lifecycle with single-flight initialization,
//! first-frame SSE decoding, bounded fixed-delay retries and heuristic
//! session-expiry recovery.
//!
//! ## Usage
//!
//! ```no_run
//! use divination_mcp::{ ProtocolClient, ProviderId };
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), divination_mcp::Error> {
//! let client = ProtocolClient::from_env(ProviderId::Tarot)?;
//!
//! let tools = client.list_tools().await?;
//! for tool in &tools {
//!     println!("{}: {}", tool.name, tool.description.as_deref().unwrap_or(""));
//! }
//!
//! let result = client.call_tool("tarot_reading", Some(json!({ "spread": "three_card" }))).await?;
//! if result.success {
//!     println!("{:?}", result.data);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod errors;
pub mod protocol;
pub mod retry;
pub mod session;
pub mod stream;

pub use client::{ HttpTransport, ProtocolClient, ProviderConfig, ProviderSet, Transport };
pub use errors::Error;
pub use protocol::{ ProviderId, ToolCallResult, ToolInfo, ToolPayload };
pub use retry::RetryPolicy;
pub use session::{ Session, SessionState };
