// incontrol-core: Device hierarchy and polling layer between incontrol-api and the CLI.
//
// Discovery walks org → group → device once, every discovered device is
// registered in a session-owned `DeviceRegistry`, and a poll task refreshes
// them on an interval. Entities observe devices and re-read their state
// after each real update.

pub mod config;
pub mod device;
pub mod discovery;
pub mod entity;
pub mod error;
pub mod model;
pub mod registry;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SessionConfig;
pub use device::{Device, DeviceObserver, DeviceSnapshot};
pub use discovery::Discovery;
pub use entity::{
    ConnectivityState, DeviceInfo, DeviceStatusSensor, Entity, EntitySet, LocationTracker,
    SourceType, WanSignalSensor, WanStatusSensor, signal_icon,
};
pub use error::CoreError;
pub use model::{DeviceKey, Group, Location, Org};
pub use registry::DeviceRegistry;
pub use session::{Session, UpdateSummary};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};

// Wire types callers commonly need alongside the domain layer.
pub use incontrol_api::{ResourceId, TokenRecord, WanInterface};
