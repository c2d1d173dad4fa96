// ── Device handle ──
//
// A registered light, sensor or group. Identity, declared capabilities and
// behavior are fixed at creation; availability, capability values and
// settings live behind one mutex so a whole incoming message is applied
// atomically. Events are collected while the lock is held and published
// after it is released.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use deconz_api::AttributeMap;

use super::behavior::{ButtonTokens, DeviceBehavior};
use super::capability::{Capability, CapabilityValue};
use super::resource::{DeviceKey, ResourceKind};

const EVENT_CHANNEL_SIZE: usize = 64;

// ── Events ───────────────────────────────────────────────────────────

/// Notifications a device publishes to the hub layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    CapabilityChanged {
        key: DeviceKey,
        capability: Capability,
        value: CapabilityValue,
    },
    SettingChanged {
        key: DeviceKey,
        setting: String,
        value: Value,
    },
    AvailabilityChanged {
        key: DeviceKey,
        available: bool,
        reason: Option<String>,
    },
    BecameReachable {
        key: DeviceKey,
    },
    BecameUnreachable {
        key: DeviceKey,
    },
    RawButton {
        key: DeviceKey,
        code: i64,
        tokens: Option<ButtonTokens>,
        gesture: Option<i64>,
        payload: AttributeMap,
    },
    /// Plug behavior: `onoff` changed.
    Switched {
        key: DeviceKey,
        on: bool,
    },
}

// ── State ────────────────────────────────────────────────────────────

/// Mutable part of a device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceState {
    pub available: bool,
    pub unavailable_reason: Option<String>,
    pub values: HashMap<Capability, CapabilityValue>,
    pub settings: serde_json::Map<String, Value>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            available: true,
            unavailable_reason: None,
            values: HashMap::new(),
            settings: serde_json::Map::new(),
        }
    }
}

// ── Device ───────────────────────────────────────────────────────────

pub struct Device {
    key: DeviceKey,
    name: String,
    capabilities: BTreeSet<Capability>,
    behavior: DeviceBehavior,
    state: Mutex<DeviceState>,
    events: broadcast::Sender<DeviceEvent>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("behavior", &self.behavior)
            .finish_non_exhaustive()
    }
}

impl Device {
    pub fn new(
        kind: ResourceKind,
        id: impl Into<String>,
        name: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            key: DeviceKey::new(kind, id),
            name: name.into(),
            capabilities: capabilities.into_iter().collect(),
            behavior: DeviceBehavior::Standard,
            state: Mutex::new(DeviceState::default()),
            events,
        }
    }

    pub fn with_behavior(mut self, behavior: DeviceBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Initial settings; only keys present here are ever updated by
    /// device-info and config translation.
    pub fn with_settings(self, settings: serde_json::Map<String, Value>) -> Self {
        self.lock().settings = settings;
        self
    }

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn kind(&self) -> ResourceKind {
        self.key.kind
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> DeviceBehavior {
        self.behavior
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn capability_value(&self, capability: Capability) -> Option<CapabilityValue> {
        self.lock().values.get(&capability).cloned()
    }

    pub fn setting(&self, key: &str) -> Option<Value> {
        self.lock().settings.get(key).cloned()
    }

    pub fn is_available(&self) -> bool {
        self.lock().available
    }

    /// Copy of the current mutable state.
    pub fn snapshot(&self) -> DeviceState {
        self.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Ignored unless the capability is declared.
    pub fn set_capability_value(&self, capability: Capability, value: impl Into<CapabilityValue>) {
        let value = value.into();
        self.mutate(|tx| tx.set_capability(capability, value));
    }

    pub fn set_setting(&self, key: &str, value: Value) {
        self.mutate(|tx| tx.set_setting(key, value));
    }

    pub fn set_available(&self) {
        self.mutate(|tx| tx.set_available());
    }

    pub fn set_unavailable(&self, reason: &str) {
        self.mutate(|tx| tx.set_unavailable(reason));
    }

    pub fn fire_raw_event(&self, code: i64, gesture: Option<i64>, payload: AttributeMap) {
        self.mutate(|tx| tx.fire_raw_event(code, gesture, payload));
    }

    /// Apply a batch of changes under a single lock acquisition, then
    /// publish every event the batch produced.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut DeviceTxn<'_>) -> R) -> R {
        let (result, events) = {
            let mut state = self.lock();
            let mut tx = DeviceTxn {
                device: self,
                state: &mut state,
                events: Vec::new(),
            };
            let result = f(&mut tx);
            (result, tx.events)
        };

        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        result
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Transaction ──────────────────────────────────────────────────────

/// Exclusive access to a device's state for the duration of one batch.
pub struct DeviceTxn<'a> {
    device: &'a Device,
    state: &'a mut DeviceState,
    events: Vec<DeviceEvent>,
}

impl DeviceTxn<'_> {
    pub fn device(&self) -> &Device {
        self.device
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.device.has_capability(capability)
    }

    pub fn is_available(&self) -> bool {
        self.state.available
    }

    pub fn value(&self, capability: Capability) -> Option<&CapabilityValue> {
        self.state.values.get(&capability)
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.state.settings.get(key).filter(|v| !v.is_null())
    }

    pub fn setting_bool(&self, key: &str) -> bool {
        self.setting(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn setting_f64(&self, key: &str) -> f64 {
        self.setting(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// Store a capability value after the behavior transform.
    ///
    /// Undeclared capabilities are skipped; a write of the current value
    /// emits nothing.
    pub fn set_capability(&mut self, capability: Capability, value: CapabilityValue) {
        if !self.supports(capability) {
            return;
        }
        let behavior = self.device.behavior;
        let value = behavior.transform(capability, value);
        let previous = self.state.values.insert(capability, value.clone());
        if previous.as_ref() == Some(&value) {
            return;
        }

        if behavior == DeviceBehavior::Plug && capability == Capability::Onoff {
            if let Some(on) = value.as_bool() {
                self.emit(DeviceEvent::Switched {
                    key: self.device.key.clone(),
                    on,
                });
            }
        }
        self.emit(DeviceEvent::CapabilityChanged {
            key: self.device.key.clone(),
            capability,
            value,
        });
    }

    /// Write a setting; identical values are not rewritten.
    pub fn set_setting(&mut self, key: &str, value: Value) {
        if self.state.settings.get(key) == Some(&value) {
            return;
        }
        self.state.settings.insert(key.to_owned(), value.clone());
        self.emit(DeviceEvent::SettingChanged {
            key: self.device.key.clone(),
            setting: key.to_owned(),
            value,
        });
    }

    pub fn set_available(&mut self) {
        if self.state.available {
            return;
        }
        self.state.available = true;
        self.state.unavailable_reason = None;
        self.emit(DeviceEvent::AvailabilityChanged {
            key: self.device.key.clone(),
            available: true,
            reason: None,
        });
    }

    pub fn set_unavailable(&mut self, reason: &str) {
        if !self.state.available && self.state.unavailable_reason.as_deref() == Some(reason) {
            return;
        }
        self.state.available = false;
        self.state.unavailable_reason = Some(reason.to_owned());
        self.emit(DeviceEvent::AvailabilityChanged {
            key: self.device.key.clone(),
            available: false,
            reason: Some(reason.to_owned()),
        });
    }

    pub fn became_reachable(&mut self) {
        self.emit(DeviceEvent::BecameReachable {
            key: self.device.key.clone(),
        });
    }

    pub fn became_unreachable(&mut self) {
        self.emit(DeviceEvent::BecameUnreachable {
            key: self.device.key.clone(),
        });
    }

    pub fn fire_raw_event(&mut self, code: i64, gesture: Option<i64>, payload: AttributeMap) {
        let tokens = match self.device.behavior {
            DeviceBehavior::ButtonTokens => Some(ButtonTokens::decode(code)),
            DeviceBehavior::Plug => {
                debug!(device = %self.device.key, code, "plug reported a button event");
                return;
            }
            _ => None,
        };
        self.emit(DeviceEvent::RawButton {
            key: self.device.key.clone(),
            code,
            tokens,
            gesture,
            payload,
        });
    }

    fn emit(&mut self, event: DeviceEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn light() -> Device {
        Device::new(
            ResourceKind::Lights,
            "3",
            "Desk lamp",
            [Capability::Onoff, Capability::Dim],
        )
    }

    #[test]
    fn undeclared_capability_is_ignored() {
        let dev = light();
        let mut rx = dev.subscribe();
        dev.set_capability_value(Capability::MeasureBattery, 50.0);
        assert!(dev.capability_value(Capability::MeasureBattery).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn repeated_value_emits_once() {
        let dev = light();
        let mut rx = dev.subscribe();
        dev.set_capability_value(Capability::Onoff, true);
        dev.set_capability_value(Capability::Onoff, true);
        assert!(matches!(
            rx.try_recv().unwrap(),
            DeviceEvent::CapabilityChanged { capability: Capability::Onoff, .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn events_flush_after_batch() {
        let dev = light();
        let mut rx = dev.subscribe();
        dev.mutate(|tx| {
            tx.set_capability(Capability::Onoff, CapabilityValue::Bool(true));
            tx.set_capability(Capability::Dim, CapabilityValue::Number(0.5));
            tx.set_unavailable("Unreachable");
        });
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(!dev.is_available());
    }

    #[test]
    fn plug_emits_switched_on_change() {
        let dev = Device::new(ResourceKind::Lights, "9", "Plug", [Capability::Onoff])
            .with_behavior(DeviceBehavior::Plug);
        let mut rx = dev.subscribe();
        dev.set_capability_value(Capability::Onoff, true);
        assert!(matches!(
            rx.try_recv().unwrap(),
            DeviceEvent::Switched { on: true, .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            DeviceEvent::CapabilityChanged { .. }
        ));

        dev.set_capability_value(Capability::Onoff, true);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn settings_are_not_rewritten_when_equal() {
        let mut settings = serde_json::Map::new();
        settings.insert("swversion".into(), json!("1.0"));
        let dev = light().with_settings(settings);
        let mut rx = dev.subscribe();

        dev.set_setting("swversion", json!("1.0"));
        assert!(rx.try_recv().is_err());

        dev.set_setting("swversion", json!("1.1"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            DeviceEvent::SettingChanged { .. }
        ));
        assert_eq!(dev.setting("swversion"), Some(json!("1.1")));
    }

    #[test]
    fn button_tokens_behavior_decodes_code() {
        let dev = Device::new(ResourceKind::Sensors, "12", "Dimmer", [])
            .with_behavior(DeviceBehavior::ButtonTokens);
        let mut rx = dev.subscribe();
        dev.fire_raw_event(4002, None, AttributeMap::new());
        match rx.try_recv().unwrap() {
            DeviceEvent::RawButton { code, tokens, .. } => {
                assert_eq!(code, 4002);
                assert_eq!(tokens, Some(ButtonTokens::decode(4002)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn set_available_restores_once() {
        let dev = light();
        dev.set_unavailable("Websocket is down");
        let mut rx = dev.subscribe();

        dev.set_available();
        dev.set_available();

        assert!(dev.is_available());
        assert!(dev.snapshot().unavailable_reason.is_none());
        assert!(matches!(
            rx.try_recv().unwrap(),
            DeviceEvent::AvailabilityChanged { available: true, reason: None, .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn plug_button_events_are_not_forwarded() {
        let dev = Device::new(ResourceKind::Lights, "9", "Plug", [Capability::Onoff])
            .with_behavior(DeviceBehavior::Plug);
        let mut rx = dev.subscribe();
        dev.fire_raw_event(1002, None, AttributeMap::new());
        assert!(rx.try_recv().is_err());
    }
}
