//! Accessory Synchronization Engine
//!
//! Maps entities of a home-automation source system onto accessories of a
//! remote-control protocol and keeps the two in sync in both directions.
//!
//! # Features
//!
//! - **Forward Sync**: entity state changes are coerced and published as characteristic values
//! - **Reverse Sync**: remote writes become ordered service calls on the source system
//! - **Composite Accessories**: air quality and air purifier accessories merge linked entities
//! - **Closed Kind Set**: accessories are selected from a read-only constructor table
//! - **Scoped Subscriptions**: every subscription is released on teardown
//!
//! # Architecture
//!
//! ```text
//! StateSource ──► registry::build ──► Accessory ──► CharacteristicMap ──► notifications
//!                                        ▲   │
//! EventHub deliveries ── handle(target) ─┘   └── write_characteristics ──► ServiceCaller
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use entity_bus::{EventHub, MemoryBus};
//! use hap_accessory::{registry, AccessoryConfig, Characteristic, SyncContext};
//! use serde_json::json;
//!
//! let bus = MemoryBus::new();
//! bus.set_state("sensor.office", "21.5", [("device_class", json!("temperature"))]);
//!
//! let ctx = SyncContext::new(&bus, &bus);
//! let mut accessory = registry::build(2, &AccessoryConfig::new("sensor.office"), &ctx).unwrap();
//!
//! let hub = EventHub::new();
//! accessory.run(&hub, None);
//!
//! let temperature = accessory.characteristic(Characteristic::CurrentTemperature);
//! assert_eq!(temperature.map(|v| v.as_f64()), Some(21.5));
//!
//! accessory.teardown(&hub);
//! ```

pub mod accessory;
pub mod catalog;
pub mod coerce;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use accessory::{
    Accessory, AccessoryHandler, AccessoryInfo, AccessoryVariant, Notifier, SyncContext,
    SyncRoute, SyncTarget, WriteBatch,
};
pub use catalog::{Category, Characteristic, Service, ServiceDeclaration};
pub use coerce::AirQuality;
pub use config::{AccessoryConfig, BridgeConfig};
pub use error::{Result, SyncError};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::accessory::{Accessory, SyncContext, SyncRoute, SyncTarget, WriteBatch};
    pub use crate::catalog::{Characteristic, Service};
    pub use crate::config::{AccessoryConfig, BridgeConfig};
    pub use crate::error::{Result, SyncError};
    pub use crate::registry;
}
