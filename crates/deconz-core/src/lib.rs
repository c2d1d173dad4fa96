//! Bridge logic between `deconz-api` and a hub's device model.
//!
//! - **[`GatewaySession`]** owns one gateway: the event stream connection
//!   (with ping keepalive, watchdog and reconnect), the reconciliation
//!   poller, optional auto-repair of a moved gateway address, and live
//!   swaps of its configuration.
//!
//! - **[`DeviceRegistry`]** maps a resource kind and gateway id to the
//!   registered [`Device`]. Devices declare their [`Capability`] set and a
//!   [`DeviceBehavior`]; every state change is published as a
//!   [`DeviceEvent`] to subscribers.
//!
//! - **[`translate`]** turns raw gateway attribute maps into normalized
//!   capability values, applied atomically per payload.
//!
//! - **[`setup`]** covers first-run discovery and API key registration.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod poll;
pub mod registry;
pub mod session;
pub mod settings;
pub mod setup;
pub mod translate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{GatewayConfig, SessionOptions};
pub use connection::{ConnectionState, RepairOutcome, STREAM_DOWN_REASON};
pub use dispatch::{Dispatch, dispatch};
pub use error::CoreError;
pub use poll::SyncReport;
pub use registry::DeviceRegistry;
pub use session::GatewaySession;
pub use settings::{MemorySettingsStore, SettingsStore};
pub use setup::{
    DEVICE_TYPE, SetupOutcome, authenticate, complete_authentication, discover_and_register,
    discover_gateway,
};
pub use translate::Source;

pub use model::{
    ButtonTokens, Capability, CapabilityValue, Device, DeviceBehavior, DeviceEvent, DeviceKey,
    DeviceState, ResourceKind,
};
