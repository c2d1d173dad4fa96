// ── State translation engine ──
//
// Applies raw gateway attribute maps to a device's capability model. Each
// entry point runs inside one device transaction, so a payload is applied
// atomically and its events are published together.

pub mod color;
mod config;
mod info;
mod state;

use deconz_api::{AttributeMap, ResourceEntry};

use crate::model::{Device, DeviceTxn};

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Pushed over the event stream as it happened.
    Stream,
    /// Read back by a poll; momentary effects are not replayed.
    Reconciliation,
}

/// Apply a `state` or group `action` object.
pub fn apply_state(device: &Device, state: &AttributeMap, source: Source) {
    device.mutate(|tx| state::apply(tx, state, source));
}

/// Apply a sensor `config` object.
pub fn apply_config(device: &Device, config: &AttributeMap) {
    device.mutate(|tx| config::apply(tx, config));
}

/// Apply the descriptive fields of a resource listing entry.
pub fn apply_info(device: &Device, info: &AttributeMap) {
    device.mutate(|tx| info::apply(tx, info));
}

/// Apply a whole polled resource: state, config, then device info.
pub fn apply_entry(device: &Device, entry: &ResourceEntry) {
    device.mutate(|tx| {
        if let Some(state) = &entry.state {
            state::apply(tx, state, Source::Reconciliation);
        }
        if let Some(config) = &entry.config {
            config::apply(tx, config);
        }
        info::apply(tx, &entry.attributes);
    });
}

/// Shared by state and config: availability follows `reachable`, with
/// transition notifications fired only on a genuine change.
fn apply_reachable(tx: &mut DeviceTxn<'_>, reachable: bool) {
    let ignore = tx.setting_bool("ignore-reachable");

    if !ignore {
        if reachable && !tx.is_available() {
            tx.became_reachable();
        } else if !reachable && tx.is_available() {
            tx.became_unreachable();
        }
    }

    if reachable || ignore {
        tx.set_available();
    } else {
        tx.set_unavailable("Unreachable");
    }
}
