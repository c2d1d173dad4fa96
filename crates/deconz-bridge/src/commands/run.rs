//! `run`: the long-lived bridge process.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{info, warn};

use deconz_core::{Device, SyncReport};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::output;

use super::Context;

pub async fn handle(ctx: &Context, args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    ctx.require_complete()?;
    let session = ctx.session()?;

    // Subscribe before anything is applied so the initial sync is visible.
    let mut forwarders = JoinSet::new();
    for device in session.registry().all() {
        forwarders.spawn(forward_events(device, args.events));
    }

    let report = session.start().await?;
    log_report(&report);
    if !global.quiet {
        eprintln!(
            "Bridging {} device(s) from {}; press Ctrl-C to stop",
            session.registry().len(),
            ctx.path.display()
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupted, shutting down");
    session.shutdown().await;
    forwarders.abort_all();
    Ok(())
}

fn log_report(report: &SyncReport) {
    info!(
        lights = report.lights,
        sensors = report.sensors,
        groups = report.groups,
        "initial sync"
    );
    for (kind, reason) in &report.failures {
        warn!(%kind, %reason, "initial sync incomplete");
    }
}

async fn forward_events(device: Arc<Device>, print: bool) {
    let mut events = device.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => {
                info!(device = %device.key(), ?event, "device event");
                if print {
                    println!("{}", output::render_json_compact(&event));
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(device = %device.key(), skipped, "event consumer lagging");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use deconz_core::{Capability, CapabilityValue, DeviceEvent, DeviceKey, ResourceKind};

    use super::*;

    #[test]
    fn events_render_as_tagged_json_lines() {
        let event = DeviceEvent::CapabilityChanged {
            key: DeviceKey::new(ResourceKind::Lights, "3"),
            capability: Capability::Dim,
            value: CapabilityValue::Number(0.2),
        };
        let line = output::render_json_compact(&event);
        assert!(line.starts_with(r#"{"event":"capability_changed""#), "{line}");
        assert!(!line.contains('\n'));
    }
}
