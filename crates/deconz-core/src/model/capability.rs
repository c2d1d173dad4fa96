// ── Capability domain types ──

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A normalized property a device can expose to the hub.
///
/// The set a device supports is declared when it is registered and never
/// changes afterwards; translation only writes capabilities from that set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    Onoff,
    Dim,
    AlarmContact,
    AlarmWater,
    AlarmMotion,
    AlarmSmoke,
    AlarmCo,
    AlarmTamper,
    VibrationAlarm,
    VibrationStrength,
    TiltAngle,
    Dark,
    MeasureLuminance,
    MeasureTemperature,
    MeasureHumidity,
    MeasurePressure,
    MeasureCurrent,
    MeasurePower,
    MeasureVoltage,
    MeasureVoc,
    MeasureBattery,
    MeterPower,
    LightTemperature,
    LightHue,
    LightSaturation,
    LightMode,
    TargetTemperature,
}

/// The value currently held by a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CapabilityValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for CapabilityValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for CapabilityValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for CapabilityValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn capability_names_are_snake_case() {
        assert_eq!(Capability::Onoff.to_string(), "onoff");
        assert_eq!(Capability::AlarmCo.as_ref(), "alarm_co");
        assert_eq!(
            Capability::from_str("measure_temperature").unwrap(),
            Capability::MeasureTemperature
        );
        assert!(Capability::from_str("measure_everything").is_err());
    }

    #[test]
    fn serde_and_strum_names_agree() {
        for cap in Capability::iter() {
            let json = serde_json::to_value(cap).unwrap();
            assert_eq!(json.as_str().unwrap(), cap.as_ref());
        }
    }

    #[test]
    fn untagged_values() {
        let v: CapabilityValue = serde_json::from_str("0.5").unwrap();
        assert_eq!(v.as_f64(), Some(0.5));
        let v: CapabilityValue = serde_json::from_str("\"color\"").unwrap();
        assert_eq!(v.as_str(), Some("color"));
        assert_eq!(CapabilityValue::from(true).to_string(), "true");
    }
}
