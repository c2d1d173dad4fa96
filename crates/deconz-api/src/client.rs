// Gateway REST client
//
// Wraps `reqwest::Client` with deCONZ-specific URL construction and status
// handling. Endpoint methods (lights, sensors, groups, scenes) live in
// `resources.rs` as inherent methods to keep this module focused on transport
// mechanics.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::error_description;
use crate::transport::TransportConfig;

/// HTTP client for a single gateway's REST API.
///
/// Every API-key scoped call goes to `http://{host}:{port}/api/{key}/{path}`.
/// Timeouts come from the [`TransportConfig`] the client was built with.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl RestClient {
    /// Create a client for `host:port` from a `TransportConfig`.
    pub fn new(
        host: &str,
        port: u16,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: base_url(host, port)?,
            api_key,
        })
    }

    /// Create a client with a pre-built `reqwest::Client` and base URL.
    pub fn with_client(http: reqwest::Client, base_url: Url, api_key: SecretString) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    /// The gateway base URL (`http://host:port/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build an API-key scoped URL: `{base}/api/{key}/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let key = self.api_key.expose_secret();
        let full = if path.is_empty() {
            format!("api/{key}")
        } else {
            format!("api/{key}/{path}")
        };
        Ok(self.base_url.join(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and return the raw body of a success response.
    pub(crate) async fn get_text(&self, url: Url) -> Result<String, Error> {
        debug!(path = %redact(&url), "GET");
        let resp = self.http.get(url).send().await?;
        check_status(resp).await
    }

    /// Send a GET request and deserialize the body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let body = self.get_text(url).await?;
        decode(&body)
    }

    /// Send a PUT request with a JSON body.
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!(path = %redact(&url), "PUT");
        let resp = self.http.put(url).json(body).send().await?;
        let body = check_status(resp).await?;
        decode(&body)
    }

    /// Send a POST request with a JSON body.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!(path = %redact(&url), "POST");
        let resp = self.http.post(url).json(body).send().await?;
        let body = check_status(resp).await?;
        decode(&body)
    }
}

/// `http://host:port/`
pub fn base_url(host: &str, port: u16) -> Result<Url, Error> {
    Ok(Url::parse(&format!("http://{host}:{port}/"))?)
}

/// Map non-success statuses to typed errors; return the body otherwise.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if status.is_success() {
        return Ok(body);
    }

    let message = error_description(&body).unwrap_or_else(|| status.to_string());
    match status.as_u16() {
        401 | 403 => Err(Error::Unauthorized { message }),
        code => Err(Error::Gateway {
            status: code,
            message,
        }),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

/// Path with the API key segment masked, for logs.
fn redact(url: &Url) -> String {
    let mut segments = url.path().split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some("api"), Some(_key)) => {
            let rest: Vec<&str> = segments.collect();
            if rest.is_empty() {
                "/api/***".to_owned()
            } else {
                format!("/api/***/{}", rest.join("/"))
            }
        }
        _ => url.path().to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::with_client(
            reqwest::Client::new(),
            base_url("10.0.0.2", 8080).unwrap(),
            SecretString::from("KEY123".to_owned()),
        )
    }

    #[test]
    fn api_url_includes_key() {
        let url = client().api_url("lights/3/state").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.2:8080/api/KEY123/lights/3/state");
    }

    #[test]
    fn api_url_for_full_state() {
        let url = client().api_url("").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.2:8080/api/KEY123");
    }

    #[test]
    fn redact_hides_key() {
        let url = client().api_url("sensors").unwrap();
        assert_eq!(redact(&url), "/api/***/sensors");
        let url = base_url("10.0.0.2", 80).unwrap().join("api").unwrap();
        assert_eq!(redact(&url), "/api");
    }
}
