// deconz-api: Async Rust client for the deCONZ gateway REST API and event stream

pub mod client;
pub mod discovery;
pub mod error;
pub mod models;
pub mod register;
mod resources;
pub mod stream;
pub mod transport;

pub use client::RestClient;
pub use discovery::{DEFAULT_DISCOVERY_URL, DiscoveryClient};
pub use error::Error;
pub use models::{
    AttributeMap, DiscoveredGateway, GatewayInfo, MessagePayload, Registration, ResourceEntry,
    ResourceMap, StreamMessage,
};
pub use register::register;
pub use stream::{StreamConnection, StreamFrame, stream_url};
pub use transport::TransportConfig;
