//! Provider Configuration
//!
//! Static, per-provider settings: endpoint, API key, protocol version,
//! client identity and the fixed header set attached to every outbound
//! request. The variations between the five providers are data here, not
//! separate client implementations.

use http::header::{ HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE };
use url::Url;

use crate::errors::Error;
use crate::protocol::ProviderId;

/// Protocol version spoken by the bazi, yijing, star and ziwei providers
pub const PROTOCOL_VERSION_2025_03: &str = "2025-03-26";
/// Protocol version spoken by the tarot provider
pub const PROTOCOL_VERSION_2025_11: &str = "2025-11-15";

/// Header carrying the session token. Providers have historically emitted it
/// under two case variants (`Mcp-Session-Id` / `Mcp-Session-ID`); header
/// lookup is case-insensitive so both are accepted when reading.
pub const SESSION_HEADER: &str = "mcp-session-id";
/// Header carrying the protocol version marker
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";
/// Header carrying the provider API key
pub const API_KEY_HEADER: &str = "x-api-key";

const ACCEPT_JSON: &str = "application/json";
const ACCEPT_JSON_OR_STREAM: &str = "application/json, text/event-stream";
const ACCEPT_LANGUAGE_VALUE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

// The bazi provider sits behind a gateway that rejects non-browser traffic.
const BAZI_ORIGIN: &str = "https://www.modelscope.cn";
const BAZI_REFERER: &str = "https://www.modelscope.cn/";
const BAZI_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0.0 Safari/537.36 Edg/141.0.0.0.0";

/// Static configuration for one provider's protocol client
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Which provider this is
    pub provider: ProviderId,
    /// Endpoint the JSON-RPC bodies are POSTed to
    pub endpoint: Url,
    /// API key, when the provider requires one
    pub api_key: Option<String>,
    /// Protocol version sent in the handshake and the version header
    pub protocol_version: &'static str,
    /// Name reported in `clientInfo` on the handshake
    pub client_name: &'static str,
    /// Fixed extra headers attached to every request
    pub extra_headers: HeaderMap,
    /// Whether the initialize call negotiates plain JSON instead of SSE
    pub plain_json_init: bool,
}

impl ProviderConfig {
    /// Provider defaults (protocol version, client identity, fixed headers)
    pub fn new(provider: ProviderId, endpoint: Url) -> Self {
        let (protocol_version, client_name, extra_headers, plain_json_init) = match provider {
            ProviderId::Bazi => {
                (PROTOCOL_VERSION_2025_03, "BaziClient", browser_headers(), true)
            }
            ProviderId::Yijing => {
                (PROTOCOL_VERSION_2025_03, "YijingClient", HeaderMap::new(), false)
            }
            ProviderId::Star => (PROTOCOL_VERSION_2025_03, "StarClient", HeaderMap::new(), false),
            ProviderId::Tarot => {
                (PROTOCOL_VERSION_2025_11, "TarotClient", HeaderMap::new(), false)
            }
            ProviderId::Ziwei => {
                (PROTOCOL_VERSION_2025_03, "ZiweiClient", HeaderMap::new(), false)
            }
        };

        Self {
            provider,
            endpoint,
            api_key: None,
            protocol_version,
            client_name,
            extra_headers,
            plain_json_init,
        }
    }

    /// Attach the provider API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Load a provider's configuration from the environment.
    ///
    /// Reads `MCP_<PROVIDER>_ENDPOINT` and `MCP_<PROVIDER>_API_KEY`. The key
    /// is required for every provider except tarot, which is keyless.
    pub fn from_env(provider: ProviderId) -> Result<Self, Error> {
        let prefix = provider.as_str().to_uppercase();

        let endpoint_var = format!("MCP_{prefix}_ENDPOINT");
        let endpoint = std::env
            ::var(&endpoint_var)
            .map_err(|_| Error::Config(format!("{endpoint_var} is not set")))?;
        let endpoint = Url
            ::parse(&endpoint)
            .map_err(|e| Error::Config(format!("{endpoint_var} is not a valid URL: {e}")))?;

        let key_var = format!("MCP_{prefix}_API_KEY");
        let api_key = std::env::var(&key_var).ok().filter(|key| !key.trim().is_empty());
        if api_key.is_none() && provider != ProviderId::Tarot {
            return Err(Error::Config(format!("{key_var} is not set")));
        }

        let mut config = Self::new(provider, endpoint);
        config.api_key = api_key;
        Ok(config)
    }

    /// Headers for the `initialize` handshake
    pub(crate) fn init_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = self.base_headers()?;
        let accept = if self.plain_json_init { ACCEPT_JSON } else { ACCEPT_JSON_OR_STREAM };
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        Ok(headers)
    }

    /// Headers for `tools/list` and `tools/call`, carrying the session token
    pub(crate) fn request_headers(&self, session_token: &str) -> Result<HeaderMap, Error> {
        let mut headers = self.base_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON_OR_STREAM));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
        headers.insert(
            HeaderName::from_static(SESSION_HEADER),
            header_value(SESSION_HEADER, session_token)?
        );
        Ok(headers)
    }

    /// Headers for the best-effort `notifications/initialized`
    pub(crate) fn notify_headers(&self, session_token: &str) -> Result<HeaderMap, Error> {
        let mut headers = self.base_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON_OR_STREAM));
        headers.insert(
            HeaderName::from_static(SESSION_HEADER),
            header_value(SESSION_HEADER, session_token)?
        );
        Ok(headers)
    }

    fn base_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = self.extra_headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert(
            HeaderName::from_static(PROTOCOL_VERSION_HEADER),
            HeaderValue::from_static(self.protocol_version)
        );
        if let Some(api_key) = &self.api_key {
            headers.insert(
                HeaderName::from_static(API_KEY_HEADER),
                header_value(API_KEY_HEADER, api_key)?
            );
        }
        Ok(headers)
    }

    /// Masked key for startup logging: first and last four characters only.
    /// Counted in characters, not bytes, so multi-byte keys never split.
    pub(crate) fn api_key_preview(&self) -> String {
        match &self.api_key {
            None => "none".to_string(),
            Some(key) => {
                let chars: Vec<char> = key.chars().collect();
                if chars.len() <= 8 {
                    return key.clone();
                }
                let head: String = chars[..4].iter().collect();
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{head}****{tail}")
            }
        }
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|e| {
        Error::Config(format!("invalid value for header {name}: {e}"))
    })
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::ORIGIN, HeaderValue::from_static(BAZI_ORIGIN));
    headers.insert(http::header::REFERER, HeaderValue::from_static(BAZI_REFERER));
    headers.insert(http::header::USER_AGENT, HeaderValue::from_static(BAZI_USER_AGENT));
    headers
}
