//! Device listing, shared by `devices`, `sync` and `simulate`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;

use deconz_core::{Capability, CapabilityValue, Device, DeviceBehavior, DeviceRegistry, ResourceKind};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

// ── Views ───────────────────────────────────────────────────────────

/// Serializable snapshot of one device.
#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    pub behavior: DeviceBehavior,
    pub capabilities: Vec<Capability>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
    pub values: BTreeMap<Capability, CapabilityValue>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl From<&Device> for DeviceView {
    fn from(device: &Device) -> Self {
        let state = device.snapshot();
        Self {
            kind: device.kind(),
            id: device.id().to_owned(),
            name: device.name().to_owned(),
            behavior: device.behavior(),
            capabilities: device.capabilities().iter().copied().collect(),
            available: state.available,
            unavailable_reason: state.unavailable_reason,
            values: state.values.into_iter().collect(),
            settings: state.settings,
        }
    }
}

impl DeviceView {
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }

    fn values_line(&self) -> String {
        self.values
            .iter()
            .map(|(cap, value)| format!("{cap}={value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Multi-line detail view for a single device.
    pub fn detail(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} ({})", self.name, self.key());
        let _ = writeln!(out, "  behavior:  {}", self.behavior);
        match &self.unavailable_reason {
            Some(reason) => {
                let _ = writeln!(out, "  available: no ({reason})");
            }
            None => {
                let _ = writeln!(out, "  available: {}", if self.available { "yes" } else { "no" });
            }
        }
        for (cap, value) in &self.values {
            let _ = writeln!(out, "  {cap:<20} {value}");
        }
        out.trim_end().to_owned()
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "Values")]
    values: String,
}

impl From<&DeviceView> for DeviceRow {
    fn from(d: &DeviceView) -> Self {
        Self {
            kind: d.kind.to_string(),
            id: d.id.clone(),
            name: d.name.clone(),
            available: match (&d.unavailable_reason, d.available) {
                (_, true) => "yes".into(),
                (Some(reason), false) => format!("no: {reason}"),
                (None, false) => "no".into(),
            },
            values: d.values_line(),
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────────

pub fn views(registry: &DeviceRegistry) -> Vec<DeviceView> {
    registry.all().iter().map(|d| DeviceView::from(d.as_ref())).collect()
}

pub fn render(global: &GlobalOpts, views: &[DeviceView]) -> String {
    output::render_list(&global.output, views, |d| DeviceRow::from(d), DeviceView::key)
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::unnecessary_wraps)]
pub fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let registry = ctx.config.build_registry();
    if registry.is_empty() && !global.quiet {
        eprintln!("No devices registered in {}", ctx.path.display());
    }
    output::print_output(&render(global, &views(&registry)), global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_show_values_and_unavailability() {
        let device = Device::new(ResourceKind::Lights, "3", "Desk", [Capability::Onoff, Capability::Dim]);
        device.set_capability_value(Capability::Dim, 0.5);
        device.set_capability_value(Capability::Onoff, true);
        device.set_unavailable("Websocket is down");

        let view = DeviceView::from(&device);
        assert_eq!(view.key(), "lights/3");

        let row = DeviceRow::from(&view);
        assert_eq!(row.values, "onoff=true dim=0.5");
        assert_eq!(row.available, "no: Websocket is down");
    }
}
