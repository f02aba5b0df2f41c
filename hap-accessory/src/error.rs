use entity_bus::EntityId;
use thiserror::Error;

use crate::catalog::Characteristic;

/// Errors raised by the synchronization engine
///
/// Only caller mistakes surface here. Unparseable readings, unmapped
/// classes and rejected commands are logged and skipped.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The primary entity has no snapshot in the source system
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// No constructor registered under this kind name
    #[error("Unknown accessory kind '{0}'")]
    UnknownKind(String),

    /// Nothing in the taxonomy maps this entity to an accessory
    #[error("No accessory kind supports entity {0}")]
    Unsupported(EntityId),

    /// Write to an accessory without writable characteristics
    #[error("Accessory {aid} is read-only")]
    ReadOnly { aid: u64 },

    /// Write naming a characteristic the accessory does not accept
    #[error("Characteristic {characteristic} of accessory {aid} is not writable")]
    NotWritable {
        aid: u64,
        characteristic: Characteristic,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, SyncError>;
