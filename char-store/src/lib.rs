//! Characteristic Store
//!
//! Typed storage for the characteristics an accessory exposes to the
//! target protocol, with change detection and a notification channel.
//!
//! # Features
//!
//! - **Declared Formats**: values are coerced to the format and range the protocol declared
//! - **Change Detection**: every write reports whether the stored value changed
//! - **Notifications**: every write is published to an attached channel
//! - **Blocking Iteration**: consume notifications via blocking iterators
//! - **Generic Keys**: use any small copyable type as characteristic identifier
//!
//! # Quick Start
//!
//! ```rust
//! use char_store::{CharProperties, CharValue, CharacteristicMap, NotificationChannel, ValueFormat};
//!
//! let notifications = NotificationChannel::new();
//!
//! let mut map = CharacteristicMap::new(1);
//! map.configure("CurrentRelativeHumidity", CharValue::Float(0.0),
//!     CharProperties::new(ValueFormat::Float).with_range(0.0, 100.0));
//! map.set_notifier(notifications.sender());
//!
//! map.set_value("CurrentRelativeHumidity", CharValue::Float(48.0));
//!
//! for change in notifications.iter().try_iter() {
//!     println!("{:?} -> {}", change.key, change.value);
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! CharacteristicMap<K>
//!     │
//!     ├── handles: HashMap<K, CharacteristicHandle>
//!     │       │
//!     │       └── CharacteristicHandle { value: CharValue, properties }
//!     │
//!     └── notifier: mpsc::Sender<ValueChange<K>>
//!             │
//!             └── NotificationChannel<K> ── ChangeIterator<K>
//! ```

// Modules
pub mod event;
pub mod iter;
pub mod map;
pub mod value;

// Re-exports - Public API
pub use event::ValueChange;
pub use iter::{ChangeIterator, NotificationChannel, TimeoutIter, TryIter};
pub use map::{CharacteristicHandle, CharacteristicMap};
pub use value::{CharProperties, CharValue, ValueFormat};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::event::ValueChange;
    pub use crate::iter::{ChangeIterator, NotificationChannel};
    pub use crate::map::{CharacteristicHandle, CharacteristicMap};
    pub use crate::value::{CharProperties, CharValue, ValueFormat};
}
