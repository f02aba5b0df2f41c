//! Sync iterator for consuming deliveries from an EventHub
//!
//! Provides a blocking iterator interface for processing deliveries
//! without requiring async/await.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::hub::Delivery;

/// Blocking iterator over hub deliveries
///
/// This iterator blocks on `next()` until a delivery is available or the
/// channel is closed. Use `try_recv()` for non-blocking access.
pub struct DeliveryIterator<R> {
    rx: Arc<Mutex<mpsc::Receiver<Delivery<R>>>>,
}

impl<R> DeliveryIterator<R> {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<Delivery<R>>>>) -> Self {
        Self { rx }
    }

    /// Block until a delivery is available
    ///
    /// Returns `None` if the channel is closed.
    pub fn recv(&self) -> Option<Delivery<R>> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Try to receive a delivery without blocking
    pub fn try_recv(&self) -> Option<Delivery<R>> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Block until a delivery is available or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Delivery<R>> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Get a non-blocking iterator over currently queued deliveries
    pub fn try_iter(&self) -> TryIterator<'_, R> {
        TryIterator { inner: self }
    }

    /// Get a blocking iterator with timeout
    ///
    /// Blocks for up to `timeout` on each call to `next()`.
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIterator<'_, R> {
        TimeoutIterator {
            inner: self,
            timeout,
        }
    }
}

impl<R> Iterator for DeliveryIterator<R> {
    type Item = Delivery<R>;

    /// Block until the next delivery is available
    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl<R> Clone for DeliveryIterator<R> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Non-blocking iterator over currently queued deliveries
pub struct TryIterator<'a, R> {
    inner: &'a DeliveryIterator<R>,
}

impl<'a, R> Iterator for TryIterator<'a, R> {
    type Item = Delivery<R>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIterator<'a, R> {
    inner: &'a DeliveryIterator<R>,
    timeout: Duration,
}

impl<'a, R> Iterator for TimeoutIterator<'a, R> {
    type Item = Delivery<R>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
