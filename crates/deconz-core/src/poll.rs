// ── Reconciliation poller ──
//
// Periodically reads every resource listing and applies it to registered
// devices. Captures attributes the stream never pushes (battery, settings)
// and recovers from missed messages. The three listings are fetched
// concurrently and fail independently.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use deconz_api::{ResourceMap, RestClient};

use crate::model::ResourceKind;
use crate::registry::DeviceRegistry;
use crate::session::GatewaySession;
use crate::translate::{self, Source};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub lights: usize,
    pub sensors: usize,
    pub groups: usize,
    /// Listings that could not be fetched, with the reason.
    pub failures: Vec<(ResourceKind, String)>,
}

impl SyncReport {
    pub fn applied(&self) -> usize {
        self.lights + self.sensors + self.groups
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub(crate) async fn poll_task(session: GatewaySession, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_secs = period.as_secs(), "reconciliation poller started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let report = sync_once(&session).await;
                debug!(applied = report.applied(), failures = report.failures.len(), "poll finished");
            }
        }
    }
}

pub(crate) async fn sync_once(session: &GatewaySession) -> SyncReport {
    let mut report = SyncReport::default();
    let config = session.config();
    let options = session.options();

    let Some(endpoint) = config.endpoint() else {
        warn!("gateway settings incomplete, fill all the fields");
        report.failures.extend(
            [ResourceKind::Lights, ResourceKind::Sensors, ResourceKind::Groups]
                .map(|kind| (kind, "incomplete configuration".to_owned())),
        );
        return report;
    };

    let client = match RestClient::new(
        endpoint.host,
        endpoint.port,
        endpoint.api_key.clone(),
        &options.transport(),
    ) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "cannot build REST client");
            report.failures.push((ResourceKind::Lights, e.to_string()));
            return report;
        }
    };

    let (lights, sensors, groups) = tokio::join!(
        client.list_lights(),
        client.list_sensors(),
        client.list_groups()
    );
    let registry = session.registry();

    match lights {
        Ok(lights) => report.lights = apply_lights(registry, &lights),
        Err(e) => {
            warn!(error = %e, "error getting lights");
            let unreachable = e.is_unreachable();
            report.failures.push((ResourceKind::Lights, e.to_string()));
            if unreachable && options.auto_repair {
                if let Err(e) = session.repair().await {
                    warn!(error = %e, "auto-repair failed");
                }
            }
        }
    }

    match sensors {
        Ok(sensors) => report.sensors = apply_sensors(registry, &sensors),
        Err(e) => {
            warn!(error = %e, "error getting sensors");
            report.failures.push((ResourceKind::Sensors, e.to_string()));
        }
    }

    match groups {
        Ok(groups) => report.groups = apply_groups(registry, &groups),
        Err(e) => {
            warn!(error = %e, "error getting groups");
            report.failures.push((ResourceKind::Groups, e.to_string()));
        }
    }

    report
}

// ── Per-kind application ─────────────────────────────────────────────

/// Lights carry no config section; state then device info.
fn apply_lights(registry: &DeviceRegistry, lights: &ResourceMap) -> usize {
    let mut applied = 0;
    for (id, light) in lights {
        let Some(device) = registry.lookup(ResourceKind::Lights, id) else {
            continue;
        };
        translate::apply_entry(&device, light);
        applied += 1;
    }
    applied
}

fn apply_sensors(registry: &DeviceRegistry, sensors: &ResourceMap) -> usize {
    let mut applied = 0;
    for (id, sensor) in sensors {
        let Some(device) = registry.lookup(ResourceKind::Sensors, id) else {
            continue;
        };
        translate::apply_entry(&device, sensor);
        applied += 1;
    }
    applied
}

/// Groups: the last `action` is applied and the group is marked available.
fn apply_groups(registry: &DeviceRegistry, groups: &ResourceMap) -> usize {
    let mut applied = 0;
    for (id, group) in groups {
        let Some(device) = registry.lookup(ResourceKind::Groups, id) else {
            continue;
        };
        if let Some(action) = &group.action {
            device.mutate(|tx| {
                tx.set_available();
            });
            translate::apply_state(&device, action, Source::Reconciliation);
            applied += 1;
        }
    }
    applied
}
