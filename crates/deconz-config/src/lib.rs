//! Configuration for deconz-bridge.
//!
//! One TOML file (gateway address, session knobs, device registrations)
//! merged with `DECONZ_` environment overrides, credential resolution
//! (env + keyring + plaintext), translation to `deconz_core` types, and a
//! [`FileSettingsStore`] that writes setup and repair results back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use deconz_core::{
    Capability, CoreError, Device, DeviceBehavior, DeviceRegistry, GatewayConfig, ResourceKind,
    SessionOptions, SettingsStore,
};

/// Keyring service holding the gateway API key.
pub const KEYRING_SERVICE: &str = "deconz-bridge";
const KEYRING_ACCOUNT: &str = "api-key";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("gateway not configured, missing: {}", .missing.join(", "))]
    Incomplete { missing: Vec<&'static str> },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub session: SessionSection,

    /// Devices registered by the pairing layer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceEntry>,
}

/// Where the gateway lives and how to authenticate.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct GatewaySection {
    pub host: Option<String>,

    /// REST port.
    pub port: Option<u16>,

    /// Event stream port, written by `authenticate`.
    pub ws_port: Option<u16>,

    /// API key (plaintext -- prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: i64,

    #[serde(default = "default_true")]
    pub auto_repair: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            poll_interval_minutes: default_poll_interval(),
            auto_repair: true,
            request_timeout_secs: default_request_timeout(),
            ping_interval_secs: default_ping_interval(),
            reconnect_delay_secs: default_reconnect_delay(),
            discovery_url: default_discovery_url(),
        }
    }
}

fn default_poll_interval() -> i64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_request_timeout() -> u64 {
    10
}
fn default_ping_interval() -> u64 {
    60
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_discovery_url() -> String {
    deconz_core::SessionOptions::default().discovery_url.to_string()
}

/// One registered light, sensor or group.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceEntry {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub capabilities: Vec<Capability>,

    /// Gateway device type (`ZHASwitch`, `Window covering device`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,

    /// Overrides the behavior derived from model id and type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<DeviceBehavior>,

    /// Hub-side settings (`modelid`, `invert_alarm`, `temperature_offset`, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl DeviceEntry {
    pub fn behavior(&self) -> DeviceBehavior {
        self.behavior.unwrap_or_else(|| {
            let model = self.settings.get("modelid").and_then(serde_json::Value::as_str);
            DeviceBehavior::for_model(model, self.device_type.as_deref())
        })
    }

    pub fn to_device(&self) -> Device {
        Device::new(
            self.kind,
            self.id.clone(),
            self.name.clone(),
            self.capabilities.iter().copied(),
        )
        .with_behavior(self.behavior())
        .with_settings(self.settings.clone())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "deconz-bridge", "deconz-bridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("deconz-bridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys nest with a double underscore:
/// `DECONZ_GATEWAY__HOST`, `DECONZ_SESSION__POLL_INTERVAL_MINUTES`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DECONZ_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Read only what is in the file, without environment overrides.
fn read_file(path: &Path) -> Result<Config, ConfigError> {
    Ok(Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == Some(0) {
            return Err(invalid("gateway.port", "must be between 1 and 65535"));
        }
        if self.gateway.ws_port == Some(0) {
            return Err(invalid("gateway.ws_port", "must be between 1 and 65535"));
        }
        for (field, secs) in [
            ("session.request_timeout_secs", self.session.request_timeout_secs),
            ("session.ping_interval_secs", self.session.ping_interval_secs),
        ] {
            if secs == 0 {
                return Err(invalid(field, "must be at least 1 second"));
            }
        }
        url::Url::parse(&self.session.discovery_url)
            .map_err(|e| invalid("session.discovery_url", &e.to_string()))?;

        for device in &self.devices {
            if device.id.is_empty() {
                return Err(invalid("devices.id", &format!("empty id for '{}'", device.name)));
            }
        }
        Ok(())
    }

    /// Gateway settings for a session; may be incomplete on a fresh install.
    pub fn to_gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            host: self.gateway.host.clone().filter(|h| !h.is_empty()),
            port: self.gateway.port,
            ws_port: self.gateway.ws_port,
            api_key: resolve_api_key(&self.gateway),
        }
    }

    /// Like [`to_gateway_config`](Self::to_gateway_config), but every field must be present.
    pub fn complete_gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        let config = self.to_gateway_config();
        let missing = config.missing_fields();
        if missing.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Incomplete { missing })
        }
    }

    pub fn to_session_options(&self) -> Result<SessionOptions, ConfigError> {
        let s = &self.session;
        let discovery_url = url::Url::parse(&s.discovery_url)
            .map_err(|e| invalid("session.discovery_url", &e.to_string()))?;
        Ok(SessionOptions {
            poll_interval_minutes: s.poll_interval_minutes,
            auto_repair: s.auto_repair,
            request_timeout: Duration::from_secs(s.request_timeout_secs),
            ping_interval: Duration::from_secs(s.ping_interval_secs),
            reconnect_delay: Duration::from_secs(s.reconnect_delay_secs),
            discovery_url,
        })
    }

    /// Register every configured device in a fresh registry.
    pub fn build_registry(&self) -> DeviceRegistry {
        let registry = DeviceRegistry::new();
        for entry in &self.devices {
            registry.register(entry.to_device());
        }
        registry
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the API key: env var named by `api_key_env`, then the system
/// keyring, then plaintext in config.
pub fn resolve_api_key(gateway: &GatewaySection) -> Option<SecretString> {
    // 1. api_key_env → env var lookup
    if let Some(ref env_name) = gateway.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Some(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    gateway
        .api_key
        .as_ref()
        .filter(|k| !k.is_empty())
        .map(|k| SecretString::from(k.clone()))
}

/// Store the API key in the system keyring.
pub fn store_api_key(key: &SecretString) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)?.set_password(key.expose_secret())?;
    Ok(())
}

// ── Settings store ──────────────────────────────────────────────────

/// Persists setup and repair results by rewriting the TOML file.
///
/// Only the `[gateway]` table changes; the rest of the file is re-emitted
/// as loaded. Environment overrides are never written back.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
    use_keyring: bool,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            use_keyring: false,
        }
    }

    /// Keep the API key in the system keyring instead of the file.
    pub fn with_keyring(mut self) -> Self {
        self.use_keyring = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut GatewaySection)) -> Result<(), ConfigError> {
        let mut cfg = read_file(&self.path)?;
        f(&mut cfg.gateway);
        save_config_to(&cfg, &self.path)
    }

    fn persist(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        let key = config
            .api_key
            .as_ref()
            .filter(|k| !k.expose_secret().is_empty())
            .ok_or_else(|| ConfigError::Incomplete {
                missing: vec!["api_key"],
            })?;

        if self.use_keyring {
            store_api_key(key)?;
        }
        let plaintext = (!self.use_keyring).then(|| key.expose_secret().to_owned());

        self.update(|gw| {
            gw.host.clone_from(&config.host);
            gw.port = config.port;
            gw.ws_port = config.ws_port;
            gw.api_key = plaintext;
        })
    }
}

impl SettingsStore for FileSettingsStore {
    fn persist_host(&self, host: &str) -> Result<(), CoreError> {
        self.update(|gw| gw.host = Some(host.to_owned()))
            .map_err(settings_error)
    }

    fn persist_gateway(&self, config: &GatewayConfig) -> Result<(), CoreError> {
        self.persist(config).map_err(settings_error)
    }
}

fn settings_error(err: ConfigError) -> CoreError {
    CoreError::Settings {
        message: err.to_string(),
    }
}
