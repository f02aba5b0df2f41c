//! Blocking iteration over published characteristic values
//!
//! - Blocking: `recv()`, `for change in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::event::ValueChange;

/// Owner of a notification channel
///
/// Hand `sender()` to every `CharacteristicMap` that should publish, and
/// consume with `iter()`. Cloning shares the same channel.
pub struct NotificationChannel<K> {
    tx: mpsc::Sender<ValueChange<K>>,
    rx: Arc<Mutex<mpsc::Receiver<ValueChange<K>>>>,
}

impl<K> NotificationChannel<K> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// A sender to attach to a characteristic map
    pub fn sender(&self) -> mpsc::Sender<ValueChange<K>> {
        self.tx.clone()
    }

    /// Iterator over published values
    pub fn iter(&self) -> ChangeIterator<K> {
        ChangeIterator::new(Arc::clone(&self.rx))
    }
}

impl<K> Default for NotificationChannel<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for NotificationChannel<K> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Blocking iterator over published characteristic values
///
/// # Example
///
/// ```rust,ignore
/// for change in channel.iter().try_iter() {
///     println!("aid {} {:?} = {}", change.aid, change.key, change.value);
/// }
/// ```
pub struct ChangeIterator<K> {
    rx: Arc<Mutex<mpsc::Receiver<ValueChange<K>>>>,
}

impl<K> ChangeIterator<K> {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<ValueChange<K>>>>) -> Self {
        Self { rx }
    }

    /// Block until the next notification is available
    ///
    /// Returns `None` if the channel is closed.
    pub fn recv(&self) -> Option<ValueChange<K>> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Block until the next notification or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ValueChange<K>> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Try to receive a notification without blocking
    pub fn try_recv(&self) -> Option<ValueChange<K>> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Non-blocking iterator over currently queued notifications
    pub fn try_iter(&self) -> TryIter<'_, K> {
        TryIter { inner: self }
    }

    /// Iterator that waits up to `timeout` for each notification
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_, K> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl<K> Iterator for ChangeIterator<K> {
    type Item = ValueChange<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over currently queued notifications
pub struct TryIter<'a, K> {
    inner: &'a ChangeIterator<K>,
}

impl<'a, K> Iterator for TryIter<'a, K> {
    type Item = ValueChange<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a, K> {
    inner: &'a ChangeIterator<K>,
    timeout: Duration,
}

impl<'a, K> Iterator for TimeoutIter<'a, K> {
    type Item = ValueChange<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
