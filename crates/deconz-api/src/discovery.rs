// Gateway discovery
//
// The Phoscon discovery service reports the gateways registered from the
// caller's public address as `[{ "internalipaddress": ..., "internalport": ...}]`.
// Anything other than a non-empty array counts as a failed discovery.

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::client::check_status;
use crate::error::Error;
use crate::models::DiscoveredGateway;
use crate::transport::TransportConfig;

/// Default discovery endpoint.
pub const DEFAULT_DISCOVERY_URL: &str = "https://phoscon.de/discover";

/// Client for the discovery endpoint.
pub struct DiscoveryClient {
    http: reqwest::Client,
    url: Url,
}

impl DiscoveryClient {
    pub fn new(url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            url,
        })
    }

    pub fn with_client(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    /// All advertised gateways.
    pub async fn discover_all(&self) -> Result<Vec<DiscoveredGateway>, Error> {
        debug!(url = %self.url, "querying discovery endpoint");
        let resp = self.http.get(self.url.clone()).send().await?;
        let body = check_status(resp).await?;
        parse_candidates(&body)
    }

    /// The first advertised gateway.
    pub async fn discover(&self) -> Result<DiscoveredGateway, Error> {
        self.discover_all()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::DiscoveryFailed("no gateway advertised".into()))
    }
}

fn parse_candidates(body: &str) -> Result<Vec<DiscoveredGateway>, Error> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| Error::DiscoveryFailed(format!("invalid response: {body}")))?;

    let Value::Array(items) = value else {
        return Err(Error::DiscoveryFailed(format!("invalid response: {body}")));
    };

    let candidates: Vec<DiscoveredGateway> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if candidates.is_empty() {
        return Err(Error::DiscoveryFailed("no gateway advertised".into()));
    }
    Ok(candidates)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_candidates() {
        let body = r#"[{"id":"00212EFFFF012345","internalipaddress":"192.168.1.30",
                        "internalport":8080,"macaddress":"00212EFFFF012345","name":"Phoscon-GW"}]"#;
        let found = parse_candidates(body).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].internalipaddress, "192.168.1.30");
        assert_eq!(found[0].internalport, 8080);
    }

    #[test]
    fn port_defaults_to_80() {
        let found = parse_candidates(r#"[{"internalipaddress":"10.0.0.9"}]"#).unwrap();
        assert_eq!(found[0].internalport, 80);
    }

    #[test]
    fn rejects_empty_and_non_array() {
        assert!(matches!(parse_candidates("[]"), Err(Error::DiscoveryFailed(_))));
        assert!(matches!(
            parse_candidates(r#"{"error":"rate limited"}"#),
            Err(Error::DiscoveryFailed(_))
        ));
        assert!(matches!(
            parse_candidates("<html>"),
            Err(Error::DiscoveryFailed(_))
        ));
    }
}
