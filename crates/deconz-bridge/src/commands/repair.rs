//! `repair`: re-discover a gateway whose address changed.

use deconz_core::RepairOutcome;

use crate::cli::GlobalOpts;
use crate::error::CliError;

use super::Context;

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let session = ctx.session()?;
    let outcome = session.repair().await;
    // A successful repair reconnects; this command only wanted the address.
    session.shutdown().await;

    match outcome? {
        RepairOutcome::HostChanged { previous, host } => {
            if !global.quiet {
                eprintln!(
                    "Gateway moved from {} to {host}; saved to {}",
                    previous.as_deref().unwrap_or("<unset>"),
                    ctx.path.display()
                );
            }
        }
        RepairOutcome::Unchanged => {
            if !global.quiet {
                eprintln!("Gateway address unchanged");
            }
        }
    }
    Ok(())
}
