// ── Device-info translation ──
//
// Descriptive fields from a resource listing. A field is only written when
// the device already carries the setting and the value actually changed.

use serde_json::Value;

use deconz_api::AttributeMap;

use crate::model::DeviceTxn;

pub(crate) fn apply(tx: &mut DeviceTxn<'_>, info: &AttributeMap) {
    for key in ["modelid", "manufacturername", "swversion", "lastseen"] {
        if let Some(value) = info.get(key) {
            update(tx, key, stringify(value));
        }
    }

    // `00:17:88:01:03:28:4f:21-0b` -> `00:17:88:01:03:28:4f:21`
    let mac = info
        .get("uniqueid")
        .and_then(Value::as_str)
        .and_then(|id| id.split('-').next())
        .filter(|mac| !mac.is_empty());
    if let Some(mac) = mac {
        update(tx, "mac", mac.to_owned());
    }
}

fn update(tx: &mut DeviceTxn<'_>, key: &str, value: String) {
    if tx.setting(key).is_some() {
        tx.set_setting(key, Value::String(value));
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
