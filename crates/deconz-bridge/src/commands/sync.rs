//! `sync`: one reconciliation pass, then the resulting device table.

use tracing::warn;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::{Context, devices};

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    ctx.require_complete()?;
    let session = ctx.session()?;
    let report = session.full_sync().await;

    for (kind, reason) in &report.failures {
        warn!(%kind, %reason, "resource list not applied");
    }
    if report.applied() == 0 && report.failures.len() == 3 {
        let config = session.config();
        let reason = report
            .failures
            .first()
            .map(|(_, reason)| reason.clone())
            .unwrap_or_default();
        return Err(CliError::ConnectionFailed {
            url: format!(
                "http://{}:{}",
                config.host.as_deref().unwrap_or_default(),
                config.port.unwrap_or_default()
            ),
            source: reason.into(),
        });
    }

    output::print_output(
        &devices::render(global, &devices::views(session.registry())),
        global.quiet,
    );
    Ok(())
}
