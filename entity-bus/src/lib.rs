//! # Entity Bus
//!
//! The boundary between the accessory engine and the source state bus.
//!
//! ## Overview
//!
//! The source system reports entities (a scalar state string plus
//! attributes) and accepts service calls. This crate gives those concepts
//! types and provides the subscription hub the engine uses to learn about
//! changes.
//!
//! ## Key Features
//!
//! - **Sync-First API**: All methods are synchronous - no async/await required
//! - **Reference Counting**: Thread-safe tracking of live registrations per entity
//! - **Cancellation Tokens**: Releasing a token makes any in-flight delivery stale
//! - **Ordered Delivery**: One channel, consumed in publish order
//! - **In-Memory Source**: `MemoryBus` for tests and demos
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use entity_bus::{EntityId, EventHub, MemoryBus, StateSource};
//!
//! let bus = MemoryBus::new();
//! let hub = Arc::new(EventHub::new());
//! bus.attach(hub.clone());
//!
//! let token = hub.subscribe([EntityId::from("binary_sensor.door")], "front door");
//! bus.set_state("binary_sensor.door", "on", [("device_class", serde_json::json!("door"))]);
//!
//! for delivery in hub.iter().try_iter() {
//!     let snapshot = bus.state(&delivery.event.entity_id).unwrap();
//!     println!("{} -> {}", delivery.route, snapshot.state);
//! }
//!
//! hub.unsubscribe(token).unwrap();
//! ```
//!
//! ## Architecture
//!
//! The hub implements the **Reference-Counted Observable** pattern:
//!
//! 1. **Registration**: A caller subscribes a route to a set of entities and gets a token
//! 2. **Reference Counting**: Each registration increments the count of every entity it names
//! 3. **Fan-Out**: A published event is queued once per registration naming the entity
//! 4. **Release**: Unsubscribing decrements counts and invalidates the token immediately

pub mod call;
pub mod entity;
pub mod error;
pub mod hub;
pub mod iter;
pub mod memory;

// Re-export main types for convenience
pub use call::{ServiceCall, ServiceCaller, StateSource};
pub use entity::{
    EntityEvent, EntityId, StateSnapshot, ATTR_DEVICE_CLASS, ATTR_SUPPORTED_FEATURES,
    ATTR_UNIT_OF_MEASUREMENT,
};
pub use error::{BusError, Result};
pub use hub::{Delivery, EventHub, EventSink, SubscriptionToken};
pub use iter::DeliveryIterator;
pub use memory::MemoryBus;

/// Prelude module for convenient imports
///
/// ```rust
/// use entity_bus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BusError, Delivery, DeliveryIterator, EntityEvent, EntityId, EventHub, EventSink,
        MemoryBus, Result, ServiceCall, ServiceCaller, StateSnapshot, StateSource,
        SubscriptionToken,
    };
}
