// ── Settings persistence seam ──
//
// The session never writes files itself. Whoever owns the configuration
// (deconz-config's file store, or a hub's own settings manager) implements
// this trait and the session calls it before acting on a new address.

use std::sync::{Mutex, PoisonError};

use secrecy::ExposeSecret;

use crate::config::GatewayConfig;
use crate::error::CoreError;

pub trait SettingsStore: Send + Sync {
    /// Remember a re-discovered gateway host.
    fn persist_host(&self, host: &str) -> Result<(), CoreError>;

    /// Remember a complete gateway configuration after setup.
    fn persist_gateway(&self, config: &GatewayConfig) -> Result<(), CoreError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    host: Mutex<Option<String>>,
    gateway: Mutex<Option<GatewayConfig>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(&self) -> Option<String> {
        self.host
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn gateway(&self) -> Option<GatewayConfig> {
        self.gateway
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn persist_host(&self, host: &str) -> Result<(), CoreError> {
        *self.host.lock().unwrap_or_else(PoisonError::into_inner) = Some(host.to_owned());
        Ok(())
    }

    fn persist_gateway(&self, config: &GatewayConfig) -> Result<(), CoreError> {
        if config.api_key.as_ref().is_none_or(|k| k.expose_secret().is_empty()) {
            return Err(CoreError::Settings {
                message: "refusing to persist a gateway without API key".into(),
            });
        }
        *self.host.lock().unwrap_or_else(PoisonError::into_inner) = config.host.clone();
        *self.gateway.lock().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
        Ok(())
    }
}
