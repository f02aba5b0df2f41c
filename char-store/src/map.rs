//! Per-accessory characteristic storage
//!
//! - `CharacteristicHandle`: one live value plus its declared properties
//! - `CharacteristicMap<K>`: the accessory's handles keyed by characteristic
//!
//! The map is built once at accessory construction. `configure` declares a
//! characteristic with its initial value; every later write goes through
//! `set_value`, which coerces to the declared format and publishes to the
//! attached notifier.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::mpsc;

use crate::event::ValueChange;
use crate::value::{CharProperties, CharValue};

// ============================================================================
// CharacteristicHandle
// ============================================================================

/// A configured characteristic: current value and declared properties
#[derive(Debug, Clone)]
pub struct CharacteristicHandle {
    value: CharValue,
    properties: CharProperties,
}

impl CharacteristicHandle {
    fn new(initial: CharValue, properties: CharProperties) -> Self {
        Self {
            value: properties.to_valid_value(initial),
            properties,
        }
    }

    /// Current stored value
    pub fn value(&self) -> CharValue {
        self.value
    }

    /// Declared properties
    pub fn properties(&self) -> &CharProperties {
        &self.properties
    }

    /// Store a value, returning the coerced value and whether it changed
    fn store(&mut self, value: CharValue) -> (CharValue, bool) {
        let valid = self.properties.to_valid_value(value);
        let changed = valid != self.value;
        self.value = valid;
        (valid, changed)
    }
}

// ============================================================================
// CharacteristicMap<K>
// ============================================================================

/// Characteristic handles for one accessory
///
/// Generic over the characteristic key so the catalog of identifiers stays
/// with the protocol layer.
///
/// # Example
///
/// ```rust
/// use char_store::{CharProperties, CharValue, CharacteristicMap, NotificationChannel, ValueFormat};
///
/// let channel = NotificationChannel::new();
/// let mut map = CharacteristicMap::new(3);
/// map.configure("CurrentTemperature", CharValue::Float(0.0), CharProperties::new(ValueFormat::Float));
/// map.set_notifier(channel.sender());
///
/// assert_eq!(map.set_value("CurrentTemperature", CharValue::Float(21.5)), Some(true));
/// assert_eq!(map.value("CurrentTemperature"), Some(CharValue::Float(21.5)));
///
/// let published = channel.iter().try_recv().unwrap();
/// assert_eq!(published.aid, 3);
/// assert!(published.changed);
/// ```
pub struct CharacteristicMap<K>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
{
    aid: u64,
    handles: HashMap<K, CharacteristicHandle>,
    /// Declaration order
    order: Vec<K>,
    notifier: Option<mpsc::Sender<ValueChange<K>>>,
}

impl<K> CharacteristicMap<K>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
{
    /// Create an empty map for the accessory with id `aid`
    pub fn new(aid: u64) -> Self {
        Self {
            aid,
            handles: HashMap::new(),
            order: Vec::new(),
            notifier: None,
        }
    }

    /// Accessory id this map belongs to
    pub fn aid(&self) -> u64 {
        self.aid
    }

    /// Declare a characteristic with its initial value
    ///
    /// Returns `false` and leaves the existing handle untouched if `key` was
    /// already configured. Configuring never publishes.
    pub fn configure(&mut self, key: K, initial: CharValue, properties: CharProperties) -> bool {
        if self.handles.contains_key(&key) {
            return false;
        }
        self.handles
            .insert(key, CharacteristicHandle::new(initial, properties));
        self.order.push(key);
        true
    }

    /// Publish a value
    ///
    /// Returns `None` if `key` was never configured, otherwise whether the
    /// stored value changed. A notification is sent either way when a
    /// notifier is attached.
    pub fn set_value(&mut self, key: K, value: CharValue) -> Option<bool> {
        let handle = self.handles.get_mut(&key)?;
        let (valid, changed) = handle.store(value);

        if let Some(tx) = &self.notifier {
            let _ = tx.send(ValueChange::new(self.aid, key, valid, changed));
        }

        Some(changed)
    }

    /// Get a handle
    pub fn get(&self, key: K) -> Option<&CharacteristicHandle> {
        self.handles.get(&key)
    }

    /// Current value of a characteristic
    pub fn value(&self, key: K) -> Option<CharValue> {
        self.handles.get(&key).map(CharacteristicHandle::value)
    }

    /// Check if a characteristic is configured
    pub fn contains(&self, key: K) -> bool {
        self.handles.contains_key(&key)
    }

    /// Characteristics in declaration order
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Attach the channel that receives every published value
    pub fn set_notifier(&mut self, notifier: mpsc::Sender<ValueChange<K>>) {
        self.notifier = Some(notifier);
    }

    /// Detach the notifier; later writes are stored silently
    pub fn clear_notifier(&mut self) {
        self.notifier = None;
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }
}

impl<K> Debug for CharacteristicMap<K>
where
    K: Copy + Eq + Hash + Debug + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacteristicMap")
            .field("aid", &self.aid)
            .field("characteristics", &self.order)
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}
