use entity_bus::EntityId;
use hap_accessory::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Accessory not found: aid {0}")]
    AccessoryNotFound(u64),

    #[error("Entity {0} is already bridged")]
    AlreadyBridged(EntityId),

    #[error("Bridge builder is missing a {0}")]
    MissingComponent(&'static str),

    #[error("Bridge has been shut down")]
    ShutDown,

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_convert() {
        fn write() -> Result<()> {
            Err::<(), _>(SyncError::ReadOnly { aid: 3 })?;
            Ok(())
        }

        let err = write().unwrap_err();
        assert!(matches!(err, BridgeError::Sync(SyncError::ReadOnly { aid: 3 })));
        assert_eq!(err.to_string(), "Sync error: Accessory 3 is read-only");
    }
}
