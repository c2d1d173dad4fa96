// ── Config attribute translation ──

use serde_json::Value;

use deconz_api::AttributeMap;

use crate::model::{Capability, CapabilityValue, DeviceTxn};

/// Config keys mirrored into settings verbatim, when the device has the setting.
const MIRRORED_SETTINGS: &[&str] = &["sensitivity", "ledindication"];

pub(crate) fn apply(tx: &mut DeviceTxn<'_>, config: &AttributeMap) {
    if let Some(t) = config.get("temperature").and_then(Value::as_f64) {
        tx.set_capability(Capability::MeasureTemperature, CapabilityValue::Number(t / 100.0));
    }
    if let Some(battery) = config.get("battery").and_then(Value::as_f64) {
        tx.set_capability(Capability::MeasureBattery, CapabilityValue::Number(battery));
    }
    if let Some(setpoint) = config.get("heatsetpoint").and_then(Value::as_f64) {
        tx.set_capability(
            Capability::TargetTemperature,
            CapabilityValue::Number(setpoint / 100.0),
        );
    }

    for key in MIRRORED_SETTINGS {
        if let Some(value) = config.get(*key) {
            if tx.setting(key).is_some() {
                tx.set_setting(key, value.clone());
            }
        }
    }

    if let Some(pending) = config.get("pending") {
        if tx.setting("pending").is_some() {
            tx.set_setting("pending", Value::String(pending.to_string()));
        }
    }

    if let Some(reachable) = config.get("reachable").and_then(Value::as_bool) {
        super::apply_reachable(tx, reachable);
    }
}
