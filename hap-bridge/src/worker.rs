//! Background worker thread for delivery processing
//!
//! Drains hub deliveries and runs the matching accessory handler, one
//! delivery at a time, so handlers for one accessory never overlap.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use entity_bus::{Delivery, EventHub, ServiceCaller, StateSource};
use hap_accessory::{SyncContext, SyncRoute};
use parking_lot::RwLock;

use crate::bridge::SharedAccessory;

/// Commands sent from the bridge to the background worker
#[derive(Debug)]
pub(crate) enum Command {
    /// Stop after the delivery in hand
    Shutdown,
}

/// Everything the worker needs, shared with the bridge
pub(crate) struct WorkerContext {
    pub source: Arc<dyn StateSource>,
    pub caller: Arc<dyn ServiceCaller>,
    pub hub: Arc<EventHub<SyncRoute>>,
    pub accessories: Arc<RwLock<BTreeMap<u64, SharedAccessory>>>,
    pub poll_interval: Duration,
}

/// Spawns the background sync worker thread
pub(crate) fn spawn_sync_worker(
    context: WorkerContext,
    command_rx: mpsc::Receiver<Command>,
) -> JoinHandle<()> {
    thread::spawn(move || run_sync_loop(context, command_rx))
}

fn run_sync_loop(context: WorkerContext, command_rx: mpsc::Receiver<Command>) {
    let deliveries = context.hub.iter();
    tracing::info!("Sync worker started");

    loop {
        match command_rx.try_recv() {
            Ok(Command::Shutdown) => {
                tracing::info!("Sync worker received shutdown command");
                break;
            }
            Err(TryRecvError::Disconnected) => {
                tracing::debug!("Bridge dropped, shutting down sync worker");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        if let Some(delivery) = deliveries.recv_timeout(context.poll_interval) {
            dispatch(&context, delivery);
        }
    }

    tracing::info!("Sync worker stopped");
}

/// Run the handler a delivery is routed to
///
/// Deliveries for released tokens or removed accessories are dropped.
fn dispatch(context: &WorkerContext, delivery: Delivery<SyncRoute>) {
    let Delivery { token, route, event } = delivery;

    if !context.hub.is_active(token) {
        tracing::trace!("Dropping delivery for released {}", token);
        return;
    }

    let accessory = context.accessories.read().get(&route.aid).cloned();
    let Some(accessory) = accessory else {
        tracing::debug!("No accessory with aid {}, dropping {}", route.aid, event.entity_id);
        return;
    };

    let mut accessory = accessory.lock();
    if !accessory.owns(token) {
        tracing::trace!("aid {} no longer owns {}", route.aid, token);
        return;
    }

    tracing::trace!("aid {}: {:?} after change to {}", route.aid, route.target, event.entity_id);
    let ctx = SyncContext::new(context.source.as_ref(), context.caller.as_ref());
    accessory.handle(route.target, &ctx);
}
