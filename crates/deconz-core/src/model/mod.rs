// ── Domain model ──
//
// Devices as the hub sees them: a declared capability set, a behavior
// strategy, and mutable state guarded per device.

pub mod behavior;
pub mod capability;
pub mod device;
pub mod resource;

pub use behavior::{ButtonTokens, DeviceBehavior};
pub use capability::{Capability, CapabilityValue};
pub use device::{Device, DeviceEvent, DeviceState, DeviceTxn};
pub use resource::{DeviceKey, ResourceKind};
