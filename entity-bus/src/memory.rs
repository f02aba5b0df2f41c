//! In-process source system
//!
//! `MemoryBus` holds entity snapshots, records every service call it
//! receives, and optionally forwards state changes to an attached
//! `EventSink`. It backs the bridge's tests and demos the way a recorded
//! fake stands in for a network device.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::call::{ServiceCall, ServiceCaller, StateSource};
use crate::entity::{EntityEvent, EntityId, StateSnapshot};
use crate::error::{BusError, Result};
use crate::hub::EventSink;

/// In-memory `StateSource` + `ServiceCaller`
#[derive(Default)]
pub struct MemoryBus {
    states: RwLock<HashMap<EntityId, StateSnapshot>>,
    calls: RwLock<Vec<ServiceCall>>,
    sink: RwLock<Option<Arc<dyn EventSink>>>,

    /// When set, every service call is rejected with this reason
    reject_calls: RwLock<Option<String>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward future state changes to `sink`
    pub fn attach(&self, sink: Arc<dyn EventSink>) {
        if let Ok(mut slot) = self.sink.write() {
            *slot = Some(sink);
        }
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.sink.write() {
            *slot = None;
        }
    }

    /// Store a snapshot and publish the change
    ///
    /// Returns the number of deliveries queued by the attached sink.
    pub fn set(&self, snapshot: StateSnapshot) -> usize {
        let entity_id = snapshot.entity_id.clone();
        let old_state = match self.states.write() {
            Ok(mut states) => states.insert(entity_id.clone(), snapshot.clone()),
            Err(_) => return 0,
        };

        self.publish(EntityEvent::new(entity_id, old_state, Some(snapshot)))
    }

    /// Store `state` with attributes given as `(key, value)` pairs
    pub fn set_state<I, K>(&self, entity_id: &str, state: &str, attributes: I) -> usize
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let snapshot = attributes
            .into_iter()
            .fold(StateSnapshot::new(entity_id, state), |snapshot, (key, value)| {
                snapshot.with_attribute(key, value)
            });
        self.set(snapshot)
    }

    /// Remove an entity and publish its removal
    pub fn remove(&self, entity_id: &EntityId) -> usize {
        let old_state = match self.states.write() {
            Ok(mut states) => states.remove(entity_id),
            Err(_) => return 0,
        };

        if old_state.is_none() {
            return 0;
        }
        self.publish(EntityEvent::new(entity_id.clone(), old_state, None))
    }

    /// Service calls received so far, in order
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    /// Drain the call log
    pub fn take_calls(&self) -> Vec<ServiceCall> {
        self.calls
            .write()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default()
    }

    /// Reject every subsequent service call with `reason`; `None` accepts again
    pub fn reject_calls(&self, reason: Option<&str>) {
        if let Ok(mut slot) = self.reject_calls.write() {
            *slot = reason.map(str::to_string);
        }
    }

    fn publish(&self, event: EntityEvent) -> usize {
        let sink = self.sink.read().ok().and_then(|slot| slot.clone());
        match sink {
            Some(sink) => sink.publish(event),
            None => 0,
        }
    }
}

impl StateSource for MemoryBus {
    fn state(&self, entity_id: &EntityId) -> Option<StateSnapshot> {
        self.states.read().ok()?.get(entity_id).cloned()
    }
}

impl ServiceCaller for MemoryBus {
    fn call_service(&self, call: ServiceCall) -> Result<()> {
        let rejected = self
            .reject_calls
            .read()
            .map_err(|_| BusError::LockPoisoned)?
            .clone();

        if let Some(reason) = rejected {
            return Err(BusError::CallRejected {
                call: call.to_string(),
                reason,
            });
        }

        tracing::trace!("MemoryBus received {}", call);
        self.calls
            .write()
            .map_err(|_| BusError::LockPoisoned)?
            .push(call);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("entities", &self.states.read().map(|s| s.len()).unwrap_or(0))
            .field("calls", &self.calls.read().map(|c| c.len()).unwrap_or(0))
            .finish()
    }
}
