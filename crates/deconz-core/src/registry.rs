// ── Device registry ──
//
// Concurrent map from (kind, id) to device handle. Entries are added and
// removed by the pairing layer; the core only looks them up.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::model::{Device, DeviceKey, ResourceKind};

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<DeviceKey, Arc<Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device, replacing any previous one under the same key.
    pub fn register(&self, device: Device) -> Arc<Device> {
        let device = Arc::new(device);
        debug!(device = %device.key(), name = device.name(), "registered device");
        self.devices.insert(device.key().clone(), Arc::clone(&device));
        device
    }

    pub fn lookup(&self, kind: ResourceKind, id: &str) -> Option<Arc<Device>> {
        self.devices
            .get(&DeviceKey::new(kind, id))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, kind: ResourceKind, id: &str) -> Option<Arc<Device>> {
        self.devices
            .remove(&DeviceKey::new(kind, id))
            .map(|(_, device)| device)
    }

    /// All devices, sorted by key.
    pub fn all(&self) -> Vec<Arc<Device>> {
        let mut devices: Vec<_> = self.devices.iter().map(|e| Arc::clone(e.value())).collect();
        devices.sort_by(|a, b| a.key().cmp(b.key()));
        devices
    }

    pub fn of_kind(&self, kind: ResourceKind) -> Vec<Arc<Device>> {
        self.all()
            .into_iter()
            .filter(|d| d.kind() == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Mark every device unavailable, whatever its kind.
    pub fn set_all_unavailable(&self, reason: &str) {
        // Collect first so no shard lock is held while device events fan out.
        for device in self.all() {
            device.set_unavailable(reason);
        }
    }
}
