// ── Per-model device behavior ──
//
// A small closed set of strategies instead of one type per product. The
// strategy is picked once at registration from the gateway's model id and
// device type, and consulted by the device whenever a capability is written
// or a button event arrives.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::capability::{Capability, CapabilityValue};

/// Model ids whose button events use the `button * 1000 + action` encoding.
const BUTTON_TOKEN_MODELS: &[&str] = &[
    "RWL020", "RWL021", "RWL022", "ROM001", "RDM001", "FOHSWITCH", "lumi.sensor_86sw2",
    "lumi.remote.b286acn01",
];

/// Model ids of covers that report position inverted.
const INVERTED_COVER_MODELS: &[&str] = &["lumi.curtain", "Motor Controller", "TS130F"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceBehavior {
    #[default]
    Standard,
    /// Window coverings: `onoff` and `dim` are reported inverted.
    ///
    /// Every other declared capability (battery, temperature, ...) is still
    /// written unchanged. Cover drivers that only accept the two position
    /// capabilities drop the rest instead.
    InvertedCover,
    /// Plugs: emit `Switched` whenever `onoff` actually changes.
    Plug,
    /// Multi-button switches: button events are decoded into button/action indexes.
    ButtonTokens,
    /// Warning devices: `alert` drives `onoff`.
    Siren,
}

impl DeviceBehavior {
    /// Pick the behavior for a model id and gateway device type.
    pub fn for_model(model_id: Option<&str>, device_type: Option<&str>) -> Self {
        let model = model_id.unwrap_or_default();
        let kind = device_type.unwrap_or_default();

        if INVERTED_COVER_MODELS.iter().any(|m| model.starts_with(m))
            || kind.starts_with("Window covering")
        {
            Self::InvertedCover
        } else if BUTTON_TOKEN_MODELS.contains(&model) || kind == "ZHASwitch" {
            Self::ButtonTokens
        } else if kind == "Warning device" {
            Self::Siren
        } else if kind == "Smart plug" || kind == "On/Off plug-in unit" {
            Self::Plug
        } else {
            Self::Standard
        }
    }

    /// Adjust a value before it is stored.
    pub(crate) fn transform(self, capability: Capability, value: CapabilityValue) -> CapabilityValue {
        match (self, capability, value) {
            (Self::InvertedCover, Capability::Onoff, CapabilityValue::Bool(on)) => {
                CapabilityValue::Bool(!on)
            }
            (Self::InvertedCover, Capability::Dim, CapabilityValue::Number(level)) => {
                CapabilityValue::Number(1.0 - level)
            }
            (_, _, value) => value,
        }
    }

    pub(crate) fn handles_alert(self) -> bool {
        self == Self::Siren
    }
}

/// Decoded form of a `buttonevent` code such as `2002`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonTokens {
    pub button_index: i64,
    pub action_index: i64,
}

impl ButtonTokens {
    pub fn decode(code: i64) -> Self {
        Self {
            button_index: code / 1000,
            action_index: code % 1000,
        }
    }

    /// Gateway name of the action, when it is one of the standard ones.
    pub fn action(&self) -> Option<&'static str> {
        Some(match self.action_index {
            0 => "initial_press",
            1 => "hold",
            2 => "short_release",
            3 => "long_release",
            4 => "double_press",
            5 => "triple_press",
            6 => "quadruple_press",
            7 => "shake",
            8 => "drop",
            9 => "tilt",
            10 => "many_press",
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_behavior_from_type_and_model() {
        assert_eq!(
            DeviceBehavior::for_model(Some("lumi.curtain.hagl04"), None),
            DeviceBehavior::InvertedCover
        );
        assert_eq!(
            DeviceBehavior::for_model(None, Some("Window covering device")),
            DeviceBehavior::InvertedCover
        );
        assert_eq!(
            DeviceBehavior::for_model(Some("RWL021"), Some("ZHASwitch")),
            DeviceBehavior::ButtonTokens
        );
        assert_eq!(
            DeviceBehavior::for_model(Some("TS0201"), Some("Warning device")),
            DeviceBehavior::Siren
        );
        assert_eq!(
            DeviceBehavior::for_model(Some("SP 120"), Some("Smart plug")),
            DeviceBehavior::Plug
        );
        assert_eq!(
            DeviceBehavior::for_model(Some("LCT015"), Some("Extended color light")),
            DeviceBehavior::Standard
        );
    }

    #[test]
    fn inverted_cover_only_touches_onoff_and_dim() {
        let b = DeviceBehavior::InvertedCover;
        assert_eq!(
            b.transform(Capability::Onoff, CapabilityValue::Bool(true)),
            CapabilityValue::Bool(false)
        );
        assert_eq!(
            b.transform(Capability::Dim, CapabilityValue::Number(0.25)),
            CapabilityValue::Number(0.75)
        );
        assert_eq!(
            b.transform(Capability::MeasureBattery, CapabilityValue::Number(40.0)),
            CapabilityValue::Number(40.0)
        );
    }

    #[test]
    fn decodes_button_codes() {
        let tokens = ButtonTokens::decode(2002);
        assert_eq!(tokens.button_index, 2);
        assert_eq!(tokens.action_index, 2);
        assert_eq!(tokens.action(), Some("short_release"));
        assert_eq!(ButtonTokens::decode(4099).action(), None);
    }
}
