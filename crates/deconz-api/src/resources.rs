// Gateway resource endpoints
//
// Lights, sensors, groups, scenes and the gateway config. Listing endpoints
// return JSON objects keyed by resource id.

use serde_json::{Value, json};
use tracing::debug;

use crate::client::RestClient;
use crate::error::Error;
use crate::models::{AttributeMap, GatewayInfo, ResourceEntry, ResourceMap, parse_resource_map};

impl RestClient {
    // ── Listings ─────────────────────────────────────────────────────

    /// `GET /api/{key}/lights`
    pub async fn list_lights(&self) -> Result<ResourceMap, Error> {
        self.list("lights").await
    }

    /// `GET /api/{key}/sensors`
    pub async fn list_sensors(&self) -> Result<ResourceMap, Error> {
        self.list("sensors").await
    }

    /// `GET /api/{key}/groups`
    pub async fn list_groups(&self) -> Result<ResourceMap, Error> {
        self.list("groups").await
    }

    async fn list(&self, kind: &str) -> Result<ResourceMap, Error> {
        let url = self.api_url(kind)?;
        let body = self.get_text(url).await?;
        let map = parse_resource_map(&body)?;
        debug!(kind, count = map.len(), "listed resources");
        Ok(map)
    }

    // ── Single resources ─────────────────────────────────────────────

    /// `GET /api/{key}/lights/{id}`
    pub async fn get_light(&self, id: &str) -> Result<ResourceEntry, Error> {
        let url = self.api_url(&format!("lights/{id}"))?;
        let map: AttributeMap = self.get(url).await?;
        Ok(ResourceEntry::from(map))
    }

    /// `GET /api/{key}/sensors/{id}`
    pub async fn get_sensor(&self, id: &str) -> Result<ResourceEntry, Error> {
        let url = self.api_url(&format!("sensors/{id}"))?;
        let map: AttributeMap = self.get(url).await?;
        Ok(ResourceEntry::from(map))
    }

    /// `GET /api/{key}/config`
    pub async fn get_config(&self) -> Result<GatewayInfo, Error> {
        let url = self.api_url("config")?;
        self.get(url).await
    }

    /// `GET /api/{key}` -- the complete gateway state in one document.
    ///
    /// Loosely typed: the shape is the union of every other endpoint.
    pub async fn get_full_state(&self) -> Result<Value, Error> {
        let url = self.api_url("")?;
        self.get(url).await
    }

    /// `GET /api/{key}/groups/{id}/scenes`
    pub async fn list_scenes(&self, group_id: &str) -> Result<ResourceMap, Error> {
        let url = self.api_url(&format!("groups/{group_id}/scenes"))?;
        let body = self.get_text(url).await?;
        parse_resource_map(&body)
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// `PUT /api/{key}/lights/{id}/state`
    pub async fn set_light_state(&self, id: &str, state: &AttributeMap) -> Result<Value, Error> {
        let url = self.api_url(&format!("lights/{id}/state"))?;
        self.put(url, state).await
    }

    /// `PUT /api/{key}/groups/{id}/action`
    pub async fn set_group_action(&self, id: &str, action: &AttributeMap) -> Result<Value, Error> {
        let url = self.api_url(&format!("groups/{id}/action"))?;
        self.put(url, action).await
    }

    /// `PUT /api/{key}/groups/{group}/scenes/{scene}/recall`
    pub async fn recall_scene(&self, group_id: &str, scene_id: &str) -> Result<Value, Error> {
        let url = self.api_url(&format!("groups/{group_id}/scenes/{scene_id}/recall"))?;
        self.put(url, &json!({})).await
    }

    /// `PUT /api/{key}/sensors/{id}/config`
    pub async fn set_sensor_config(&self, id: &str, config: &AttributeMap) -> Result<Value, Error> {
        let url = self.api_url(&format!("sensors/{id}/config"))?;
        self.put(url, config).await
    }

    /// `POST /api/{key}/config/export`
    ///
    /// Asks the gateway to write a backup archive. Fetching the archive is
    /// left to the caller.
    pub async fn export_config(&self) -> Result<Value, Error> {
        let url = self.api_url("config/export")?;
        self.post(url, &json!({})).await
    }
}
