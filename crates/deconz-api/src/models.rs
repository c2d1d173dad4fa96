// Gateway wire types
//
// Models for the deCONZ REST API and event stream. The gateway is loose about
// which attributes it sends per device, so attribute payloads stay as raw JSON
// maps and only the envelope fields are typed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Error;

/// Attribute name -> raw value, as sent by the gateway.
pub type AttributeMap = serde_json::Map<String, Value>;

/// Resource id -> resource, as returned by the list endpoints.
pub type ResourceMap = HashMap<String, ResourceEntry>;

// ── Resources ────────────────────────────────────────────────────────

/// A single light, sensor, or group from a list/detail endpoint.
///
/// `state`, `config` and `action` are split out; everything else
/// (`modelid`, `manufacturername`, `swversion`, `uniqueid`, `lastseen`,
/// `type`, `name`, ...) stays in `attributes` as device info.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "AttributeMap", into = "AttributeMap")]
pub struct ResourceEntry {
    pub state: Option<AttributeMap>,
    pub config: Option<AttributeMap>,
    /// Groups only: the last action applied to the group.
    pub action: Option<AttributeMap>,
    pub attributes: AttributeMap,
}

impl ResourceEntry {
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    pub fn model_id(&self) -> Option<&str> {
        self.attributes.get("modelid").and_then(Value::as_str)
    }

    /// The gateway's device type, e.g. `"Extended color light"`.
    pub fn resource_type(&self) -> Option<&str> {
        self.attributes.get("type").and_then(Value::as_str)
    }

    /// Member light ids (groups only).
    pub fn member_lights(&self) -> Vec<String> {
        self.attributes
            .get("lights")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<AttributeMap> for ResourceEntry {
    fn from(mut attributes: AttributeMap) -> Self {
        let state = take_object(&mut attributes, "state");
        let config = take_object(&mut attributes, "config");
        let action = take_object(&mut attributes, "action");
        Self {
            state,
            config,
            action,
            attributes,
        }
    }
}

impl From<ResourceEntry> for AttributeMap {
    fn from(entry: ResourceEntry) -> Self {
        let mut map = entry.attributes;
        for (key, part) in [
            ("state", entry.state),
            ("config", entry.config),
            ("action", entry.action),
        ] {
            if let Some(part) = part {
                map.insert(key.to_owned(), Value::Object(part));
            }
        }
        map
    }
}

/// Remove `key` from `map` if it holds an object; non-object values are dropped.
fn take_object(map: &mut AttributeMap, key: &str) -> Option<AttributeMap> {
    match map.remove(key) {
        Some(Value::Object(obj)) => Some(obj),
        Some(other) => {
            debug!(key, value = %other, "ignoring non-object resource section");
            None
        }
        None => None,
    }
}

/// Parse a list endpoint body leniently.
///
/// The top level must be an object keyed by resource id. Entries that are
/// not objects are skipped rather than failing the whole listing.
pub(crate) fn parse_resource_map(body: &str) -> Result<ResourceMap, Error> {
    let raw: HashMap<String, Value> =
        serde_json::from_str(body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.to_owned(),
        })?;

    Ok(raw
        .into_iter()
        .filter_map(|(id, value)| match value {
            Value::Object(obj) => Some((id, ResourceEntry::from(obj))),
            other => {
                debug!(id, value = %other, "skipping malformed resource entry");
                None
            }
        })
        .collect())
}

// ── Event stream ─────────────────────────────────────────────────────

/// A push message from the gateway event stream.
///
/// Shape: `{ "t": "event", "e": "changed", "r": "lights", "id": "3",
/// "state": { ... } }`. Exactly one of `state`, `action`, `config` is
/// meaningful per message; `attr` carries descriptive updates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamMessage {
    #[serde(rename = "t", default)]
    pub message_type: Option<String>,
    #[serde(rename = "e", default)]
    pub event: Option<String>,
    #[serde(rename = "r")]
    pub resource: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub state: Option<AttributeMap>,
    #[serde(default)]
    pub config: Option<AttributeMap>,
    #[serde(default)]
    pub action: Option<AttributeMap>,
    #[serde(default)]
    pub attr: Option<AttributeMap>,
}

/// The attribute section a stream message carries, in dispatch priority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessagePayload<'a> {
    State(&'a AttributeMap),
    Action(&'a AttributeMap),
    Config(&'a AttributeMap),
}

impl StreamMessage {
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })
    }

    /// State wins over action, action over config.
    pub fn payload(&self) -> Option<MessagePayload<'_>> {
        if let Some(state) = &self.state {
            Some(MessagePayload::State(state))
        } else if let Some(action) = &self.action {
            Some(MessagePayload::Action(action))
        } else {
            self.config.as_ref().map(MessagePayload::Config)
        }
    }

    /// Model id from the `attr` block, if present.
    pub fn attr_model_id(&self) -> Option<&str> {
        self.attr
            .as_ref()
            .and_then(|attr| attr.get("modelid"))
            .and_then(Value::as_str)
    }
}

// ── Gateway config ───────────────────────────────────────────────────

/// Subset of `GET /api/{key}/config` the bridge relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub apiversion: Option<String>,
    #[serde(default)]
    pub swversion: Option<String>,
    #[serde(default)]
    pub bridgeid: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub websocketport: Option<u16>,
    #[serde(default)]
    pub zigbeechannel: Option<u8>,
    #[serde(flatten)]
    pub extra: AttributeMap,
}

// ── Discovery ────────────────────────────────────────────────────────

/// One gateway candidate from the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredGateway {
    pub internalipaddress: String,
    #[serde(default = "default_port")]
    pub internalport: u16,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub macaddress: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_port() -> u16 {
    80
}

// ── Registration ─────────────────────────────────────────────────────

/// Result of `POST /api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The gateway issued a new API key.
    Granted { api_key: String },
    /// The gateway is locked; the user has to unlock it in Phoscon and retry.
    AuthorizationRequired,
}

/// Element of the gateway's `[{"success": ...}]` / `[{"error": ...}]` replies.
#[derive(Debug, Deserialize)]
pub(crate) struct ReplyItem {
    #[serde(default)]
    pub success: Option<Value>,
    #[serde(default)]
    pub error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyError {
    #[serde(default)]
    pub description: Option<String>,
}

/// Pull the first error description out of a gateway reply body.
pub(crate) fn error_description(body: &str) -> Option<String> {
    serde_json::from_str::<Vec<ReplyItem>>(body)
        .ok()?
        .into_iter()
        .find_map(|item| item.error.and_then(|e| e.description))
}
