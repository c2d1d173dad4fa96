// ── State attribute translation ──
//
// Maps a `state` (or group `action`) object onto capability writes. Every
// attribute is handled on its own: missing, malformed or ungated attributes
// are skipped without affecting the others.

use serde_json::Value;
use tracing::trace;

use deconz_api::AttributeMap;

use super::Source;
use super::color::{round2, xy_to_hs};
use crate::model::{Capability, CapabilityValue, DeviceTxn};

/// Highest mired value the hub's temperature scale covers.
const CT_MAX: f64 = 500.0;
const CT_MIN: f64 = 153.0;
const CT_RANGE: f64 = 347.0;

pub(crate) fn apply(tx: &mut DeviceTxn<'_>, state: &AttributeMap, source: Source) {
    button_event(tx, state, source);

    // Contact and water alarms honor the per-device inversion setting.
    let invert = tx.setting_bool("invert_alarm");
    if let Some(open) = bool_attr(state, "open") {
        set(tx, Capability::AlarmContact, open != invert);
    }
    if let Some(water) = bool_attr(state, "water") {
        set(tx, Capability::AlarmWater, water != invert);
    }

    for (attr, capability) in [
        ("presence", Capability::AlarmMotion),
        ("vibration", Capability::VibrationAlarm),
        ("on", Capability::Onoff),
        ("any_on", Capability::Onoff),
        ("dark", Capability::Dark),
        ("fire", Capability::AlarmSmoke),
        ("carbonmonoxide", Capability::AlarmCo),
        ("tampered", Capability::AlarmTamper),
    ] {
        if let Some(value) = bool_attr(state, attr) {
            set(tx, capability, value);
        }
    }

    for (attr, capability) in [
        ("vibrationstrength", Capability::VibrationStrength),
        ("tiltangle", Capability::TiltAngle),
        ("lux", Capability::MeasureLuminance),
        ("power", Capability::MeasurePower),
        ("voltage", Capability::MeasureVoltage),
        ("airqualityppb", Capability::MeasureVoc),
    ] {
        if let Some(value) = num_attr(state, attr) {
            set(tx, capability, value);
        }
    }

    if tx.device().behavior().handles_alert() {
        if let Some(alert) = state.get("alert").and_then(Value::as_str) {
            set(tx, Capability::Onoff, alert != "none");
        }
    }

    if let Some(bri) = num_attr(state, "bri") {
        set(tx, Capability::Dim, bri / 255.0);
    }

    if let Some(reachable) = bool_attr(state, "reachable") {
        super::apply_reachable(tx, reachable);
    }

    measurements(tx, state);
    color(tx, state);

    if let Some(updated) = state.get("lastupdated") {
        if tx.setting("lastUpdated").is_some() {
            tx.set_setting("lastUpdated", updated.clone());
        }
    }
}

fn button_event(tx: &mut DeviceTxn<'_>, state: &AttributeMap, source: Source) {
    let Some(code) = state.get("buttonevent").and_then(Value::as_i64) else {
        return;
    };
    if source == Source::Reconciliation {
        trace!(device = %tx.device().key(), code, "not replaying polled button event");
        return;
    }
    let gesture = state.get("gesture").and_then(Value::as_i64);
    tx.fire_raw_event(code, gesture, state.clone());
}

fn measurements(tx: &mut DeviceTxn<'_>, state: &AttributeMap) {
    if let Some(t) = num_attr(state, "temperature") {
        let offset = tx.setting_f64("temperature_offset");
        set(tx, Capability::MeasureTemperature, t / 100.0 + offset);
    }
    if let Some(h) = num_attr(state, "humidity") {
        let offset = tx.setting_f64("humidity_offset");
        set(tx, Capability::MeasureHumidity, h / 100.0 + offset);
    }
    if let Some(p) = num_attr(state, "pressure") {
        let offset = tx.setting_f64("pressure_offset");
        set(tx, Capability::MeasurePressure, p + offset);
    }
    if let Some(current) = num_attr(state, "current") {
        set(tx, Capability::MeasureCurrent, current / 100.0);
    }
    if let Some(consumption) = num_attr(state, "consumption") {
        set(tx, Capability::MeterPower, consumption / 1000.0);
    }
}

fn color(tx: &mut DeviceTxn<'_>, state: &AttributeMap) {
    let mode = state.get("colormode").and_then(Value::as_str);

    if let Some(mode) = mode {
        let light_mode = if mode == "xy" || mode == "hs" {
            "color"
        } else {
            "temperature"
        };
        set(tx, Capability::LightMode, light_mode);
    }

    match mode {
        Some("ct") => {
            if let Some(ct) = num_attr(state, "ct").filter(|ct| *ct <= CT_MAX) {
                set(tx, Capability::LightMode, "temperature");
                set(tx, Capability::LightTemperature, (ct - CT_MIN) / CT_RANGE);
            }
        }
        Some("hs") => {
            if let Some(hue) = num_attr(state, "hue") {
                set(tx, Capability::LightHue, round2(hue / 65535.0));
            }
            if let Some(sat) = num_attr(state, "sat") {
                set(tx, Capability::LightSaturation, round2(sat / 255.0));
            }
        }
        Some("xy") => {
            let hs = state
                .get("xy")
                .and_then(Value::as_array)
                .and_then(|xy| match xy.as_slice() {
                    [x, y] => Some((x.as_f64()?, y.as_f64()?)),
                    _ => None,
                })
                .and_then(|(x, y)| xy_to_hs(x, y));
            if let Some(hs) = hs {
                set(tx, Capability::LightHue, round2(hs.hue));
                set(tx, Capability::LightSaturation, round2(hs.saturation));
            }
        }
        _ => {}
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn set(tx: &mut DeviceTxn<'_>, capability: Capability, value: impl Into<CapabilityValue>) {
    tx.set_capability(capability, value.into());
}

fn bool_attr(map: &AttributeMap, key: &str) -> Option<bool> {
    map.get(key).and_then(Value::as_bool)
}

fn num_attr(map: &AttributeMap, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}
