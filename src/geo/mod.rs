//! Geography lookup collaborator.
//!
//! Resolution runs in a detached task after registration; a failure or
//! timeout leaves the connection's country at "Unknown" and never blocks or
//! degrades matchmaking.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// How long a lookup may take before the connection keeps "Unknown".
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors from the geography collaborator.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geography lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geography lookup response had no country field")]
    MissingCountry,
}

/// Best-effort IP-to-country resolution.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CountryResolver: Send + Sync {
    /// Resolve the country name for the given address.
    async fn resolve(&self, ip: IpAddr) -> Result<String, GeoError>;
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    country: Option<String>,
}

/// Resolver backed by an ip-api.com-compatible HTTP endpoint.
///
/// Queries `{endpoint}/{ip}` and reads the `country` field of the JSON
/// response.
pub struct HttpCountryResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCountryResolver {
    /// Create a resolver for the given endpoint (e.g. `http://ip-api.com/json`).
    pub fn new(endpoint: String) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl CountryResolver for HttpCountryResolver {
    async fn resolve(&self, ip: IpAddr) -> Result<String, GeoError> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), ip);
        let response = self.client.get(&url).send().await?;
        let body: GeoResponse = response.error_for_status()?.json().await?;
        body.country.ok_or(GeoError::MissingCountry)
    }
}
