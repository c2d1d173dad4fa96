// ── Runtime session configuration ──
//
// These types describe *where* the gateway is and *how* the session behaves.
// They never touch disk: deconz-config builds them and hands them in, and the
// session swaps them wholesale on change.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use deconz_api::TransportConfig;

/// Ratio between the keepalive watchdog and the outbound ping interval.
const KEEPALIVE_FACTOR: f64 = 3.1;

/// Address and credentials of one gateway.
///
/// Fields are optional because a fresh install has none of them; the session
/// refuses to connect until [`is_complete`](Self::is_complete) holds.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub host: Option<String>,
    /// REST port.
    pub port: Option<u16>,
    /// Event stream port, learned from `GET /config` during setup.
    pub ws_port: Option<u16>,
    pub api_key: Option<SecretString>,
}

impl GatewayConfig {
    pub fn new(host: impl Into<String>, port: u16, ws_port: u16, api_key: SecretString) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ws_port: Some(ws_port),
            api_key: Some(api_key),
        }
    }

    /// Names of the fields still missing, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.as_deref().is_none_or(str::is_empty) {
            missing.push("host");
        }
        if self.port.is_none() {
            missing.push("port");
        }
        if self.ws_port.is_none() {
            missing.push("ws_port");
        }
        if self
            .api_key
            .as_ref()
            .is_none_or(|k| k.expose_secret().is_empty())
        {
            missing.push("api_key");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Copy with a different host; everything else is kept.
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..self.clone()
        }
    }

    /// Whether two configs point the stream and REST client at the same place.
    pub fn same_endpoint(&self, other: &Self) -> bool {
        let key = |c: &Self| c.api_key.as_ref().map(|k| k.expose_secret().to_owned());
        self.host == other.host
            && self.port == other.port
            && self.ws_port == other.ws_port
            && key(self) == key(other)
    }

    /// The parts needed to talk to the gateway, if complete.
    pub(crate) fn endpoint(&self) -> Option<Endpoint<'_>> {
        match (&self.host, self.port, self.ws_port, &self.api_key) {
            (Some(host), Some(port), Some(ws_port), Some(api_key)) if self.is_complete() => {
                Some(Endpoint {
                    host,
                    port,
                    ws_port,
                    api_key,
                })
            }
            _ => None,
        }
    }
}

/// Borrowed view of a complete [`GatewayConfig`].
pub(crate) struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub ws_port: u16,
    pub api_key: &'a SecretString,
}

/// Behavior knobs of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Minutes between reconciliation polls. Zero or negative disables polling.
    pub poll_interval_minutes: i64,
    /// Re-discover the gateway address after the stream drops.
    pub auto_repair: bool,
    /// Upper bound for every REST call and the stream handshake.
    pub request_timeout: Duration,
    /// Interval of outbound keepalive pings.
    pub ping_interval: Duration,
    /// Pause before reconnecting a dropped stream.
    pub reconnect_delay: Duration,
    pub discovery_url: Url,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 15,
            auto_repair: true,
            request_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(5),
            discovery_url: default_discovery_url(),
        }
    }
}

impl SessionOptions {
    /// Poll period, or `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        u64::try_from(self.poll_interval_minutes)
            .ok()
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(m.saturating_mul(60)))
    }

    /// How long the stream may go without a peer ping before it is declared dead.
    pub fn keepalive_timeout(&self) -> Duration {
        self.ping_interval.mul_f64(KEEPALIVE_FACTOR)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::with_timeout(self.request_timeout)
    }

    /// Whether a change from `self` to `other` needs a fresh stream connection.
    pub(crate) fn affects_connection(&self, other: &Self) -> bool {
        self.ping_interval != other.ping_interval || self.request_timeout != other.request_timeout
    }
}

fn default_discovery_url() -> Url {
    Url::parse(deconz_api::DEFAULT_DISCOVERY_URL).expect("default discovery URL is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> GatewayConfig {
        GatewayConfig::new("192.168.1.20", 80, 443, SecretString::from("KEY".to_owned()))
    }

    #[test]
    fn reports_missing_fields() {
        let cfg = GatewayConfig {
            host: Some(String::new()),
            port: Some(80),
            ..GatewayConfig::default()
        };
        assert_eq!(cfg.missing_fields(), vec!["host", "ws_port", "api_key"]);
        assert!(!cfg.is_complete());
        assert!(cfg.endpoint().is_none());
        assert!(complete().is_complete());
    }

    #[test]
    fn same_endpoint_compares_key() {
        let a = complete();
        let mut b = complete();
        assert!(a.same_endpoint(&b));
        b.api_key = Some(SecretString::from("OTHER".to_owned()));
        assert!(!a.same_endpoint(&b));
        assert!(!a.same_endpoint(&a.with_host("192.168.1.21")));
    }

    #[test]
    fn poll_interval_disabled_when_not_positive() {
        let mut opts = SessionOptions::default();
        assert_eq!(opts.poll_interval(), Some(Duration::from_secs(900)));
        opts.poll_interval_minutes = 0;
        assert_eq!(opts.poll_interval(), None);
        opts.poll_interval_minutes = -3;
        assert_eq!(opts.poll_interval(), None);
    }

    #[test]
    fn keepalive_is_derived_from_ping_interval() {
        let opts = SessionOptions::default();
        assert_eq!(opts.keepalive_timeout().as_millis(), 186_000);
    }
}
