//! Provider Constructors
//!
//! Named constructors for the five divination providers and a
//! [`ProviderSet`] bundling one client per provider for services that use
//! them all.

use url::Url;

use crate::errors::Error;
use crate::protocol::ProviderId;

use super::ProtocolClient;
use super::config::ProviderConfig;
use super::transport::HttpTransport;

impl ProtocolClient<HttpTransport> {
    /// Build a client from a full configuration
    pub fn connect(config: ProviderConfig) -> Result<Self, Error> {
        Ok(Self::with_transport(config, HttpTransport::new()?))
    }

    /// Build a client from `MCP_<PROVIDER>_ENDPOINT` / `MCP_<PROVIDER>_API_KEY`
    pub fn from_env(provider: ProviderId) -> Result<Self, Error> {
        Self::connect(ProviderConfig::from_env(provider)?)
    }

    /// Four-pillar (bazi) chart provider
    pub fn bazi(endpoint: Url, api_key: impl Into<String>) -> Result<Self, Error> {
        Self::connect(ProviderConfig::new(ProviderId::Bazi, endpoint).with_api_key(api_key))
    }

    /// Yijing hexagram provider
    pub fn yijing(endpoint: Url, api_key: impl Into<String>) -> Result<Self, Error> {
        Self::connect(ProviderConfig::new(ProviderId::Yijing, endpoint).with_api_key(api_key))
    }

    /// Western astrology / zodiac provider
    pub fn star(endpoint: Url, api_key: impl Into<String>) -> Result<Self, Error> {
        Self::connect(ProviderConfig::new(ProviderId::Star, endpoint).with_api_key(api_key))
    }

    /// Tarot reading provider (keyless)
    pub fn tarot(endpoint: Url) -> Result<Self, Error> {
        Self::connect(ProviderConfig::new(ProviderId::Tarot, endpoint))
    }

    /// Ziwei doushu chart provider
    pub fn ziwei(endpoint: Url, api_key: impl Into<String>) -> Result<Self, Error> {
        Self::connect(ProviderConfig::new(ProviderId::Ziwei, endpoint).with_api_key(api_key))
    }
}

/// One client per provider, for services that consult all five
pub struct ProviderSet {
    bazi: ProtocolClient,
    yijing: ProtocolClient,
    star: ProtocolClient,
    tarot: ProtocolClient,
    ziwei: ProtocolClient,
}

impl ProviderSet {
    /// Build every provider client from the environment
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            bazi: ProtocolClient::from_env(ProviderId::Bazi)?,
            yijing: ProtocolClient::from_env(ProviderId::Yijing)?,
            star: ProtocolClient::from_env(ProviderId::Star)?,
            tarot: ProtocolClient::from_env(ProviderId::Tarot)?,
            ziwei: ProtocolClient::from_env(ProviderId::Ziwei)?,
        })
    }

    /// Look up the client for one provider
    pub fn get(&self, provider: ProviderId) -> &ProtocolClient {
        match provider {
            ProviderId::Bazi => &self.bazi,
            ProviderId::Yijing => &self.yijing,
            ProviderId::Star => &self.star,
            ProviderId::Tarot => &self.tarot,
            ProviderId::Ziwei => &self.ziwei,
        }
    }
}
