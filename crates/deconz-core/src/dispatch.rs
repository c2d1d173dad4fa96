// ── Stream message dispatch ──
//
// Routes one pushed JSON message to its device. Nothing here can fail the
// caller: unparseable input and unknown devices are logged and dropped.

use tracing::debug;

use deconz_api::{MessagePayload, StreamMessage};

use crate::model::{DeviceKey, ResourceKind};
use crate::registry::DeviceRegistry;
use crate::translate::{self, Source};

/// The gateway's own coordinator; it is never registered as a device.
const COORDINATOR_MODEL: &str = "ConBee";

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Applied(DeviceKey),
    /// Registered device, but the message carried nothing to apply.
    NoPayload(DeviceKey),
    UnknownDevice,
    /// Unknown resource kind or missing id.
    Ignored,
    Invalid,
}

pub fn dispatch(registry: &DeviceRegistry, text: &str) -> Dispatch {
    let message = match StreamMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "dropping unparseable stream message");
            return Dispatch::Invalid;
        }
    };

    let Ok(kind) = message.resource.parse::<ResourceKind>() else {
        debug!(resource = %message.resource, "ignoring message for unhandled resource");
        return Dispatch::Ignored;
    };
    let Some(id) = message.id.as_deref() else {
        return Dispatch::Ignored;
    };

    let Some(device) = registry.lookup(kind, id) else {
        if message.attr_model_id() != Some(COORDINATOR_MODEL) {
            debug!(%kind, id, event = ?message.event, "update for unregistered device");
        }
        return Dispatch::UnknownDevice;
    };

    match message.payload() {
        Some(MessagePayload::State(state) | MessagePayload::Action(state)) => {
            translate::apply_state(&device, state, Source::Stream);
        }
        Some(MessagePayload::Config(config)) => translate::apply_config(&device, config),
        None => return Dispatch::NoPayload(device.key().clone()),
    }
    Dispatch::Applied(device.key().clone())
}
