use thiserror::Error;

/// Top-level error type for the `deconz-api` crate.
///
/// Covers every failure mode across the gateway surfaces: REST transport,
/// gateway-reported errors, the event stream, and discovery.
/// `deconz-core` maps these into session-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, host unreachable, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request or handshake timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Client construction failed (TLS backend, etc.)
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Gateway ─────────────────────────────────────────────────────
    /// The gateway rejected the API key.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The gateway answered but refused access to the registration endpoint.
    #[error("Gateway discovered but not accessible")]
    NotAccessible,

    /// Any other non-success status, with the gateway's error description.
    #[error("Gateway error (HTTP {status}): {message}")]
    Gateway { status: u16, message: String },

    // ── Event stream ────────────────────────────────────────────────
    /// Stream connection or read failed.
    #[error("Stream connection failed: {0}")]
    StreamConnect(String),

    // ── Discovery ───────────────────────────────────────────────────
    /// Discovery returned nothing usable (empty or non-array body).
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the gateway host could not be reached at all.
    ///
    /// Used to decide whether the configured address is stale.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect(),
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Gateway { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(403),
            Self::NotAccessible => Some(404),
            _ => None,
        }
    }
}
