// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the discovery client share timeout and user-agent
// settings through this module, avoiding duplicated builder logic.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("deconz-bridge/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound for every outbound HTTP call, connect included.
    pub timeout: Duration,
    /// Upper bound for establishing the TCP connection alone.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout: timeout.min(Duration::from_secs(5)),
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }
}
