//! Protocol Client
//!
//! Generic JSON-RPC-over-SSE client shared by the five divination
//! providers. One instance owns a session, a monotonic request id counter
//! and a retry policy; the provider differences live entirely in
//! [`ProviderConfig`].
//!
//! Request flow for `tools/list` and `tools/call`:
//!
//! 1. Ensure the session is active, performing the `initialize` handshake
//!    if this task wins the claim, or waiting on the winner otherwise.
//! 2. POST the envelope and decode the first SSE frame of the response.
//! 3. On a detected session expiry, drop the session and run the whole
//!    sequence again under the session retry policy.

pub mod config;
pub mod providers;
pub mod transport;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;
use std::sync::atomic::{ AtomicI64, Ordering };

use serde_json::Value;
use tracing::{ debug, info, warn };

use crate::errors::Error;
use crate::protocol::{
    INITIALIZE_REQUEST_ID,
    ProviderId,
    RequestEnvelope,
    ToolCallResult,
    ToolInfo,
    envelope,
};
use crate::retry::{ RetryPolicy, session_retryable, transport_retryable };
use crate::session::{ Claim, Session, signals_session_expiry };
use crate::stream::{ decode_initialize, decode_tool_response, decode_tools_list };

pub use config::ProviderConfig;
pub use providers::ProviderSet;
pub use transport::{ HttpTransport, Transport, WireRequest, WireResponse };

/// Client for one provider endpoint, generic over the wire transport
pub struct ProtocolClient<T: Transport = HttpTransport> {
    config: ProviderConfig,
    transport: Arc<T>,
    session: Session,
    request_ids: AtomicI64,
    retry: RetryPolicy,
}

impl<T: Transport> ProtocolClient<T> {
    /// Build a client over an explicit transport
    pub fn with_transport(config: ProviderConfig, transport: T) -> Self {
        info!(
            provider = %config.provider,
            endpoint = %config.endpoint,
            api_key = %config.api_key_preview(),
            "provider client created"
        );
        let provider = config.provider;
        Self {
            config,
            transport: Arc::new(transport),
            session: Session::new(provider),
            // Id 1 is reserved for initialize; the counter hands out 2, 3, ...
            request_ids: AtomicI64::new(1),
            retry: RetryPolicy::default(),
        }
    }

    /// Which provider this client talks to
    pub fn provider(&self) -> ProviderId {
        self.config.provider
    }

    /// The client's session, exposed for inspection
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn next_request_id(&self) -> i64 {
        self.request_ids.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// List the tools the provider exposes
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, Error> {
        self.retry.run("tools/list", session_retryable, || async move {
            let token = self.ensure_active().await?;
            let request = envelope::tools_list_request(self.next_request_id());
            let frame = self.post_for_frame(&request, &token).await?;
            decode_tools_list(&frame)
        }).await
    }

    /// Invoke a named tool. Application-level failures are reported in the
    /// returned [`ToolCallResult`], not as errors.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<Value>
    ) -> Result<ToolCallResult, Error> {
        self.retry.run("tools/call", session_retryable, || {
            let arguments = arguments.clone();
            async move {
                let token = self.ensure_active().await?;
                let request = envelope::tool_call_request(
                    self.next_request_id(),
                    tool_name,
                    arguments
                );
                let frame = self.post_for_frame(&request, &token).await?;
                decode_tool_response(&frame)
            }
        }).await
    }

    /// POST one envelope and return the first response frame.
    ///
    /// Transport-level failures (HTTP 5xx / 429) are retried here; a body
    /// that signals session expiry drops the session and surfaces
    /// [`Error::SessionExpired`] for the outer session retry to handle.
    async fn post_for_frame(&self, request: &RequestEnvelope, token: &str) -> Result<String, Error> {
        let body = request.to_json()?;
        let headers = self.config.request_headers(token)?;
        self.retry.run(&request.method, transport_retryable, || {
            let body = body.clone();
            let headers = headers.clone();
            async move {
                let response = self.transport.post(WireRequest {
                    url: self.config.endpoint.clone(),
                    headers,
                    body,
                }).await?;

                let status = response.status;
                if !status.is_success() {
                    let text = response.collect_text().await.unwrap_or_default();
                    if signals_session_expiry(&text) {
                        self.session.invalidate();
                        return Err(Error::SessionExpired(text));
                    }
                    return Err(Error::transport(Some(status.as_u16()), text));
                }

                crate::stream::first_frame(response.frames).await
            }
        }).await
    }

    /// Resolve the session token, initializing the session if needed.
    ///
    /// Exactly one task performs the handshake; concurrent callers wait for
    /// its outcome rather than racing their own.
    async fn ensure_active(&self) -> Result<Arc<str>, Error> {
        match self.session.claim() {
            Claim::Active(token) => Ok(token),
            Claim::Follower => self.session.wait_active().await,
            Claim::Winner(permit) => {
                match self.handshake().await {
                    Ok(token) => {
                        let token = permit.complete(token);
                        self.spawn_initialized_notification(&token);
                        Ok(token)
                    }
                    Err(e) => {
                        permit.fail();
                        Err(Error::session_init_failed(e))
                    }
                }
            }
        }
    }

    /// Perform the `initialize` handshake and extract the session token
    async fn handshake(&self) -> Result<String, Error> {
        let request = envelope::initialize_request(
            self.config.protocol_version,
            self.config.client_name
        );
        debug_assert_eq!(request.id, Some(INITIALIZE_REQUEST_ID));

        let body = request.to_json()?;
        let headers = self.config.init_headers()?;
        debug!(provider = %self.config.provider, "initializing session");

        self.retry.run("initialize", transport_retryable, || {
            let body = body.clone();
            let headers = headers.clone();
            async move {
                let response = self.transport.post(WireRequest {
                    url: self.config.endpoint.clone(),
                    headers,
                    body,
                }).await?;

                let status = response.status;
                let session_header = response.headers
                    .get(config::SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let text = response.collect_text().await.unwrap_or_default();

                if !status.is_success() {
                    return Err(Error::transport(Some(status.as_u16()), text));
                }

                self.extract_session_token(session_header, &text)
            }
        }).await
    }

    /// Token precedence: response header, then `result.sessionId` in the
    /// body, then a locally synthesized identifier for providers that never
    /// assign one.
    fn extract_session_token(
        &self,
        session_header: Option<String>,
        body: &str
    ) -> Result<String, Error> {
        if let Some(token) = session_header.filter(|t| !t.is_empty()) {
            return Ok(token);
        }

        let init = decode_initialize(body)?;
        if let Some(token) = init.session_id.filter(|t| !t.is_empty()) {
            return Ok(token);
        }

        let server = init.server_info.unwrap_or_default();
        let token = synthesize_token(
            server.name.as_deref().unwrap_or(""),
            server.version.as_deref().unwrap_or("")
        );
        warn!(
            provider = %self.config.provider,
            token = %token,
            "provider assigned no session id, synthesized one locally"
        );
        Ok(token)
    }

    /// Fire-and-forget `notifications/initialized`. Failures are logged and
    /// swallowed; the session is usable either way.
    fn spawn_initialized_notification(&self, token: &Arc<str>) {
        let request = envelope::initialized_notification();
        let body = match request.to_json() {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = %self.config.provider, error = %e, "initialized notification not sent");
                return;
            }
        };
        let headers = match self.config.notify_headers(token) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(provider = %self.config.provider, error = %e, "initialized notification not sent");
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let url = self.config.endpoint.clone();
        let provider = self.config.provider;
        let retry = self.retry;
        tokio::spawn(async move {
            let outcome = retry.run("notifications/initialized", transport_retryable, || {
                let body = body.clone();
                let headers = headers.clone();
                let url = url.clone();
                let transport = Arc::clone(&transport);
                async move {
                    let response = transport.post(WireRequest { url, headers, body }).await?;
                    let status = response.status;
                    if !status.is_success() {
                        let text = response.collect_text().await.unwrap_or_default();
                        return Err(Error::transport(Some(status.as_u16()), text));
                    }
                    Ok(())
                }
            }).await;

            if let Err(e) = outcome {
                warn!(%provider, error = %e, "initialized notification failed");
            }
        });
    }
}

/// Session token for providers whose handshake carries no id at all
fn synthesize_token(server_name: &str, server_version: &str) -> String {
    let name = sanitize(server_name);
    let version = sanitize(server_version);
    format!("local-{name}-{version}-{}", uuid::Uuid::new_v4())
}

fn sanitize(part: &str) -> String {
    if part.is_empty() {
        return "unknown".to_string();
    }
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
