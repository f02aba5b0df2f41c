//! HapSync Bridge
//!
//! Sync-first facade over the accessory synchronization engine. A `Bridge`
//! owns its accessories, subscribes them to the source system through a
//! shared hub, and runs their handlers on a background thread.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use entity_bus::MemoryBus;
//! use hap_bridge::{AccessoryConfig, Bridge, BridgeConfig, Characteristic};
//!
//! fn main() -> Result<(), hap_bridge::BridgeError> {
//!     let bus = Arc::new(MemoryBus::new());
//!     let bridge = Bridge::builder()
//!         .with_source_system(Arc::clone(&bus))
//!         .with_config(BridgeConfig::default().with_name("Living Room"))
//!         .build()?;
//!     bus.attach(bridge.hub().clone());
//!
//!     let aid = bridge.add_accessory(AccessoryConfig::new("fan.living_room_purifier"))?;
//!     println!("{:?}", bridge.characteristic(aid, Characteristic::RotationSpeed));
//!
//!     for change in bridge.notifications() {
//!         println!("aid {}: {} = {}", change.aid, change.key, change.value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Threading
//!
//! Deliveries are processed one at a time by the worker. Remote writes run
//! on the caller's thread but take the same per-accessory lock, so an
//! accessory never runs two handlers at once.

mod bridge;
mod error;
mod worker;

pub use bridge::{Bridge, BridgeBuilder, DEFAULT_POLL_INTERVAL};
pub use error::{BridgeError, Result};

// Re-export the engine types callers need alongside the bridge
pub use char_store::{CharValue, ValueChange};
pub use hap_accessory::{
    AccessoryConfig, AccessoryInfo, BridgeConfig, Characteristic, Service, ServiceDeclaration,
    WriteBatch,
};
