//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use deconz_config::ConfigError;
use deconz_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFIG: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to gateway at {url}")]
    #[diagnostic(
        code(deconz::connection_failed),
        help(
            "Check that the gateway is powered and reachable.\n\
             If its address changed, run: deconz-bridge repair"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Gateway discovery failed: {reason}")]
    #[diagnostic(
        code(deconz::discovery_failed),
        help("Pass the address explicitly: deconz-bridge authenticate --host <ip>")
    )]
    DiscoveryFailed { reason: String },

    #[error("Gateway found but not accessible")]
    #[diagnostic(code(deconz::not_accessible), help("{hint}"))]
    NotAccessible { hint: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("The gateway refused to issue an API key")]
    #[diagnostic(code(deconz::link_button), help("{message}"))]
    LinkButtonRequired { message: String },

    #[error("API key rejected by the gateway")]
    #[diagnostic(
        code(deconz::auth_failed),
        help("Obtain a new key with: deconz-bridge authenticate")
    )]
    AuthFailed,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Gateway not configured, missing: {missing}")]
    #[diagnostic(
        code(deconz::incomplete_config),
        help(
            "Run: deconz-bridge authenticate\n\
             Or edit: {path}"
        )
    )]
    Incomplete { missing: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(deconz::config))]
    Config(#[from] ConfigError),

    #[error("Failed to persist settings: {message}")]
    #[diagnostic(code(deconz::settings))]
    Settings { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(deconz::validation))]
    Validation { field: String, reason: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Gateway error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(deconz::api_error))]
    ApiError { message: String, status: Option<u16> },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error(
        "Request timed out{}",
        .seconds.map(|s| format!(" after {s}s")).unwrap_or_default()
    )]
    #[diagnostic(
        code(deconz::timeout),
        help("Raise session.request_timeout_secs or check the gateway's responsiveness.")
    )]
    Timeout { seconds: Option<u64> },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. }
            | Self::DiscoveryFailed { .. }
            | Self::NotAccessible { .. } => exit_code::CONNECTION,
            Self::LinkButtonRequired { .. } | Self::AuthFailed => exit_code::AUTH,
            Self::Incomplete { .. } | Self::Config(_) | Self::Settings { .. } => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::ApiError { .. } | Self::Io(_) | Self::Internal(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::IncompleteConfig { missing } => CliError::Incomplete {
                missing: missing.join(", "),
                path: deconz_config::config_path().display().to_string(),
            },
            CoreError::GatewayNotAccessible { hint } => CliError::NotAccessible { hint },
            CoreError::DiscoveryFailed { reason } => CliError::DiscoveryFailed { reason },
            CoreError::Api {
                status: Some(401 | 403),
                ..
            } => CliError::AuthFailed,
            CoreError::Api { message, status } => CliError::ApiError { message, status },
            CoreError::Settings { message } => CliError::Settings { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_key_maps_to_auth_exit_code() {
        let err = CliError::from(CoreError::Api {
            message: "API key rejected: unauthorized user".into(),
            status: Some(403),
        });
        assert!(matches!(err, CliError::AuthFailed));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn gateway_errors_keep_status() {
        let err = CliError::from(CoreError::Api {
            message: "busy".into(),
            status: Some(503),
        });
        assert_eq!(err.to_string(), "Gateway error (503): busy");
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn incomplete_config_is_a_config_error() {
        let err = CliError::from(CoreError::IncompleteConfig {
            missing: vec!["host", "api_key"],
        });
        assert_eq!(err.to_string(), "Gateway not configured, missing: host, api_key");
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn client_timeouts_do_not_invent_a_duration() {
        let err = CliError::from(CoreError::Timeout { timeout_secs: None });
        assert_eq!(err.to_string(), "Request timed out");
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);

        let err = CliError::from(CoreError::Timeout {
            timeout_secs: Some(10),
        });
        assert_eq!(err.to_string(), "Request timed out after 10s");
    }
}
