//! Seams to the source system
//!
//! The engine never talks to the source system directly. It reads through a
//! `StateSource` and issues commands through a `ServiceCaller`; both are
//! external collaborators supplied by whoever embeds the engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{EntityId, StateSnapshot};
use crate::error::Result;

/// A command issued back to the source system (`domain.service` on an entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub entity_id: EntityId,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        entity_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            entity_id: entity_id.into(),
            data: Map::new(),
        }
    }

    /// Add a data field
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// `domain.service`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }
}

impl fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.domain, self.service, self.entity_id)?;
        if !self.data.is_empty() {
            write!(f, " {}", Value::Object(self.data.clone()))?;
        }
        Ok(())
    }
}

/// Read access to current entity state
pub trait StateSource: Send + Sync {
    /// Current snapshot, `None` if the entity does not exist
    fn state(&self, entity_id: &EntityId) -> Option<StateSnapshot>;
}

/// Command issue to the source system
///
/// Calls are fire-and-forget: an `Ok` means the call was accepted, not that
/// the device reached the requested state.
pub trait ServiceCaller: Send + Sync {
    fn call_service(&self, call: ServiceCall) -> Result<()>;
}

impl<T: StateSource + ?Sized> StateSource for std::sync::Arc<T> {
    fn state(&self, entity_id: &EntityId) -> Option<StateSnapshot> {
        (**self).state(entity_id)
    }
}

impl<T: ServiceCaller + ?Sized> ServiceCaller for std::sync::Arc<T> {
    fn call_service(&self, call: ServiceCall) -> Result<()> {
        (**self).call_service(call)
    }
}
