// ── Gateway setup ──
//
// First-run flow: find the gateway, obtain an API key, learn the stream port
// and persist the result. Every step is a request/response operation, so
// errors go back to the caller instead of being logged away.

use secrecy::SecretString;
use tracing::{debug, info};

use deconz_api::{DiscoveredGateway, DiscoveryClient, Registration, RestClient};

use crate::config::{GatewayConfig, SessionOptions};
use crate::error::{CoreError, NOT_ACCESSIBLE_HINT};
use crate::settings::SettingsStore;

/// Device type announced to the gateway when requesting a key.
pub const DEVICE_TYPE: &str = "deconz-bridge";

/// Shown while the gateway is locked.
pub const LINK_BUTTON_GUIDANCE: &str =
    "Open Phoscon, go to Gateway > Advanced and press \"Authenticate app\", then retry within 60 seconds";

/// Where an authentication attempt ended.
#[derive(Debug, Clone)]
pub enum SetupOutcome {
    /// Key granted, stream port learned, settings persisted.
    Configured(GatewayConfig),
    /// The gateway refused to issue a key until it is unlocked.
    LinkButtonRequired {
        host: String,
        port: u16,
        message: &'static str,
    },
}

/// First candidate returned by the discovery endpoint.
pub async fn discover_gateway(options: &SessionOptions) -> Result<DiscoveredGateway, CoreError> {
    let discovery = DiscoveryClient::new(options.discovery_url.clone(), &options.transport())?;
    let gateway = discovery.discover().await?;
    info!(
        host = %gateway.internalipaddress,
        port = gateway.internalport,
        "gateway discovered"
    );
    Ok(gateway)
}

/// Request an API key from `host:port`.
pub async fn authenticate(
    options: &SessionOptions,
    settings: &dyn SettingsStore,
    host: &str,
    port: u16,
) -> Result<SetupOutcome, CoreError> {
    match deconz_api::register(&options.transport(), host, port, DEVICE_TYPE).await? {
        Registration::Granted { api_key } => {
            complete_authentication(options, settings, host, port, SecretString::from(api_key))
                .await
                .map(SetupOutcome::Configured)
        }
        Registration::AuthorizationRequired => {
            info!(host, "gateway locked, link button required");
            Ok(SetupOutcome::LinkButtonRequired {
                host: host.to_owned(),
                port,
                message: LINK_BUTTON_GUIDANCE,
            })
        }
    }
}

/// Discovery followed by [`authenticate`].
///
/// A discovered gateway that answers 404 is reported with a container hint.
pub async fn discover_and_register(
    options: &SessionOptions,
    settings: &dyn SettingsStore,
) -> Result<SetupOutcome, CoreError> {
    let gateway = discover_gateway(options).await?;
    match authenticate(
        options,
        settings,
        &gateway.internalipaddress,
        gateway.internalport,
    )
    .await
    {
        Err(CoreError::GatewayNotAccessible { .. }) => Err(CoreError::GatewayNotAccessible {
            hint: format!(
                "gateway found at {}:{} but not accessible, {NOT_ACCESSIBLE_HINT}",
                gateway.internalipaddress, gateway.internalport
            ),
        }),
        other => other,
    }
}

/// Learn the stream port with a freshly issued key, then persist everything.
pub async fn complete_authentication(
    options: &SessionOptions,
    settings: &dyn SettingsStore,
    host: &str,
    port: u16,
    api_key: SecretString,
) -> Result<GatewayConfig, CoreError> {
    let client = RestClient::new(host, port, api_key.clone(), &options.transport())?;
    let info = client.get_config().await?;
    let ws_port = info.websocketport.ok_or_else(|| CoreError::Api {
        message: "gateway config has no websocketport".into(),
        status: None,
    })?;
    debug!(host, port, ws_port, "gateway config read");

    let config = GatewayConfig::new(host, port, ws_port, api_key);
    settings.persist_gateway(&config)?;
    info!(host, port, ws_port, "gateway authenticated");
    Ok(config)
}
