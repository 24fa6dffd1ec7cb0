//! HTTP Transport
//!
//! The narrow seam between the protocol client and the network: one POST of
//! a JSON-RPC body, answered with a status, headers and a byte stream. The
//! trait exists so tests can substitute a scripted transport; production use
//! goes through [`HttpTransport`] (reqwest).

use async_trait::async_trait;
use futures_util::StreamExt;
use http::{ HeaderMap, StatusCode };
use std::time::Duration;
use url::Url;

use crate::errors::Error;
use crate::stream::FrameStream;

/// Default timeout for HTTP requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One outbound JSON-RPC POST
pub struct WireRequest {
    /// Provider endpoint
    pub url: Url,
    /// Full header set, including protocol version, API key and session token
    pub headers: HeaderMap,
    /// Serialized JSON-RPC envelope
    pub body: String,
}

/// The provider's answer, body still streaming
pub struct WireResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers (session token may live here)
    pub headers: HeaderMap,
    /// Body as a stream of byte chunks
    pub frames: FrameStream,
}

impl WireResponse {
    /// Drain the body into a single string.
    ///
    /// Used for handshake responses and error bodies, which are small. A
    /// stream error after some text already arrived yields that text rather
    /// than failing, mirroring the frame decoder's premature-close tolerance.
    pub async fn collect_text(mut self) -> Result<String, Error> {
        let mut text = String::new();
        while let Some(chunk) = self.frames.next().await {
            match chunk {
                Ok(bytes) => {
                    let part = std::str
                        ::from_utf8(&bytes)
                        .map_err(|e| Error::Decode(format!("invalid UTF-8 in body: {e}")))?;
                    text.push_str(part);
                }
                Err(e) => {
                    if text.is_empty() {
                        return Err(e);
                    }
                    break;
                }
            }
        }
        Ok(text)
    }
}

/// Transport seam for one provider endpoint
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// POST a JSON-RPC body and return the streaming response
    async fn post(&self, request: WireRequest) -> Result<WireResponse, Error>;
}

/// Production transport backed by a shared reqwest client
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the default request timeout
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client
            ::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::transport(None, format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: WireRequest) -> Result<WireResponse, Error> {
        let response = self.http
            .post(request.url)
            .headers(request.headers)
            .body(request.body)
            .send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let frames: FrameStream = Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(Error::from))
        );

        Ok(WireResponse { status, headers, frames })
    }
}
