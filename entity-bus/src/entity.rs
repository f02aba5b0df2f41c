//! Entities as the source state bus reports them
//!
//! An entity is addressed by `domain.object_id` and reports a scalar state
//! string plus a free-form attribute map. Snapshots are immutable and are
//! fetched fresh for every sync; nothing here caches them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute carrying the declared class of an entity
pub const ATTR_DEVICE_CLASS: &str = "device_class";

/// Attribute carrying the unit of a numeric state
pub const ATTR_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";

/// Attribute carrying the entity's supported feature bitmask
pub const ATTR_SUPPORTED_FEATURES: &str = "supported_features";

/// Entity identifier (`domain.object_id`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Domain part (`sensor` for `sensor.kitchen`)
    pub fn domain(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(d, _)| d)
    }

    /// Object id part (`kitchen` for `sensor.kitchen`)
    pub fn object_id(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, o)| o)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Immutable view of one entity's state at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub entity_id: EntityId,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl StateSnapshot {
    pub fn new(entity_id: impl Into<EntityId>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute insertion
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// String attribute, `None` if absent or not a string
    pub fn str_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Declared class, if any
    pub fn device_class(&self) -> Option<&str> {
        self.str_attribute(ATTR_DEVICE_CLASS)
    }

    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.str_attribute(ATTR_UNIT_OF_MEASUREMENT)
    }

    /// Supported feature bitmask; `None` when the entity does not declare one
    pub fn supported_features(&self) -> Option<u64> {
        self.attributes
            .get(ATTR_SUPPORTED_FEATURES)
            .and_then(Value::as_u64)
    }

    pub fn is_state(&self, state: &str) -> bool {
        self.state == state
    }
}

/// A state change reported by the source system
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEvent {
    pub entity_id: EntityId,
    pub old_state: Option<StateSnapshot>,
    pub new_state: Option<StateSnapshot>,
}

impl EntityEvent {
    pub fn new(
        entity_id: impl Into<EntityId>,
        old_state: Option<StateSnapshot>,
        new_state: Option<StateSnapshot>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            old_state,
            new_state,
        }
    }
}
