//! Value notifications published to the target protocol
//!
//! Every `set_value` on a characteristic with an attached notifier emits a
//! `ValueChange`, whether or not the stored value changed. Re-publishing an
//! unchanged value is exactly what the remote controller sees as a
//! notification storm, so handlers that must avoid it gate their writes.

use std::time::Instant;

use crate::value::CharValue;

/// A published characteristic value
#[derive(Debug, Clone)]
pub struct ValueChange<K> {
    /// Accessory id (aid) owning the characteristic
    pub aid: u64,

    /// The characteristic that was published
    pub key: K,

    /// The value after coercion to the declared format
    pub value: CharValue,

    /// Whether the stored value differs from the previous one
    pub changed: bool,

    /// When the value was published
    pub timestamp: Instant,
}

impl<K> ValueChange<K> {
    pub fn new(aid: u64, key: K, value: CharValue, changed: bool) -> Self {
        Self {
            aid,
            key,
            value,
            changed,
            timestamp: Instant::now(),
        }
    }
}

impl<K: PartialEq> PartialEq for ValueChange<K> {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.aid == other.aid
            && self.key == other.key
            && self.value == other.value
            && self.changed == other.changed
    }
}
