//! `discover`: list gateways announced by the discovery service.

use tabled::Tabled;

use deconz_api::{DiscoveredGateway, DiscoveryClient};
use deconz_core::CoreError;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

#[derive(Tabled)]
struct GatewayRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "MAC")]
    mac: String,
}

impl From<&DiscoveredGateway> for GatewayRow {
    fn from(g: &DiscoveredGateway) -> Self {
        Self {
            id: g.id.clone().unwrap_or_default(),
            name: g.name.clone().unwrap_or_default(),
            address: format!("{}:{}", g.internalipaddress, g.internalport),
            mac: g.macaddress.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let options = ctx.config.to_session_options()?;
    let client = DiscoveryClient::new(options.discovery_url.clone(), &options.transport())
        .map_err(CoreError::from)?;
    let gateways = client.discover_all().await.map_err(CoreError::from)?;

    let out = output::render_list(
        &global.output,
        &gateways,
        |g| GatewayRow::from(g),
        |g| g.internalipaddress.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
