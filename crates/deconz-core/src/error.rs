// ── Core error types ──
//
// User-facing errors from deconz-core. Consumers never see raw HTTP status
// handling or JSON parse failures; the `From<deconz_api::Error>` impl maps
// transport-layer errors into session-level variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to gateway at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// `timeout_secs` is known only when the timeout was set by this crate,
    /// not by the HTTP client.
    #[error(
        "Gateway request timed out{}",
        .timeout_secs.map(|s| format!(" after {s}s")).unwrap_or_default()
    )]
    Timeout { timeout_secs: Option<u64> },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Gateway configuration incomplete, missing: {}", .missing.join(", "))]
    IncompleteConfig { missing: Vec<&'static str> },

    // ── Setup errors ─────────────────────────────────────────────────
    #[error("Gateway discovered but not accessible: {hint}")]
    GatewayNotAccessible { hint: String },

    #[error("Gateway discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("Failed to persist settings: {message}")]
    Settings { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Shown when registration answers 404, usually a container without host networking.
pub(crate) const NOT_ACCESSIBLE_HINT: &str =
    "if the gateway runs in docker, start it with --net=host";

// ── Conversion from transport-layer errors ───────────────────────────

impl From<deconz_api::Error> for CoreError {
    fn from(err: deconz_api::Error) -> Self {
        match err {
            deconz_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: None }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .and_then(|u| u.host_str())
                            .unwrap_or("<unknown>")
                            .to_owned(),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            deconz_api::Error::InvalidUrl(e) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Invalid URL: {e}"),
            },
            deconz_api::Error::Timeout { timeout_secs } => CoreError::Timeout {
                timeout_secs: Some(timeout_secs),
            },
            deconz_api::Error::ClientBuild(msg) => CoreError::Internal(msg),
            deconz_api::Error::Unauthorized { message } => CoreError::Api {
                message: format!("API key rejected: {message}"),
                status: Some(403),
            },
            deconz_api::Error::NotAccessible => CoreError::GatewayNotAccessible {
                hint: NOT_ACCESSIBLE_HINT.into(),
            },
            deconz_api::Error::Gateway { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            deconz_api::Error::StreamConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Event stream failed: {reason}"),
            },
            deconz_api::Error::DiscoveryFailed(reason) => CoreError::DiscoveryFailed { reason },
            deconz_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
