//! Bridge - Main entry point for the engine
//!
//! Owns every accessory, the subscription hub and a background worker that
//! turns source-system changes into characteristic updates.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use char_store::{ChangeIterator, CharValue, NotificationChannel};
use entity_bus::{EventHub, ServiceCall, ServiceCaller, StateSource};
use hap_accessory::{
    registry, Accessory, AccessoryConfig, AccessoryInfo, BridgeConfig, Characteristic,
    ServiceDeclaration, SyncContext, SyncRoute, WriteBatch,
};
use parking_lot::{Mutex, RwLock};

use crate::error::{BridgeError, Result};
use crate::worker::{spawn_sync_worker, Command, WorkerContext};

/// How long the worker waits for a delivery before checking for commands
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An accessory shared between the bridge and its worker
pub(crate) type SharedAccessory = Arc<Mutex<Accessory>>;

/// Sync-first bridge over a set of accessories
///
/// Every method blocks; event processing happens on a background thread.
///
/// # Example
///
/// ```rust,ignore
/// use hap_bridge::Bridge;
///
/// let bus = Arc::new(MemoryBus::new());
/// let bridge = Bridge::builder()
///     .with_source_system(Arc::clone(&bus))
///     .with_config(BridgeConfig::from_path("hapsync.json")?)
///     .build()?;
/// bus.attach(bridge.hub().clone());
///
/// for change in bridge.notifications() {
///     println!("aid {}: {} = {}", change.aid, change.key, change.value);
/// }
/// ```
pub struct Bridge {
    name: String,

    source: Arc<dyn StateSource>,
    caller: Arc<dyn ServiceCaller>,

    /// Subscription hub shared with the worker
    hub: Arc<EventHub<SyncRoute>>,

    /// Accessories by aid
    accessories: Arc<RwLock<BTreeMap<u64, SharedAccessory>>>,

    /// Characteristic changes from every accessory
    notifications: NotificationChannel<Characteristic>,

    next_aid: AtomicU64,

    command_tx: mpsc::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hub to attach the source system's event feed to
    pub fn hub(&self) -> &Arc<EventHub<SyncRoute>> {
        &self.hub
    }

    fn context(&self) -> SyncContext<'_> {
        SyncContext::new(self.source.as_ref(), self.caller.as_ref())
    }

    fn accessory(&self, aid: u64) -> Result<SharedAccessory> {
        self.accessories
            .read()
            .get(&aid)
            .cloned()
            .ok_or(BridgeError::AccessoryNotFound(aid))
    }

    fn is_shut_down(&self) -> bool {
        self.worker.lock().is_none()
    }

    /// Build, prime and start an accessory, returning its aid
    pub fn add_accessory(&self, config: AccessoryConfig) -> Result<u64> {
        if self.is_shut_down() {
            return Err(BridgeError::ShutDown);
        }
        config.validate()?;

        let mut accessories = self.accessories.write();
        let bridged = accessories
            .values()
            .any(|accessory| accessory.lock().info().entity_id == config.entity_id);
        if bridged {
            return Err(BridgeError::AlreadyBridged(config.entity_id));
        }

        let aid = self.next_aid.load(Ordering::SeqCst);
        let mut accessory = registry::build(aid, &config, &self.context())?;
        accessory.run(&self.hub, Some(self.notifications.sender()));
        self.next_aid.store(aid + 1, Ordering::SeqCst);

        accessories.insert(aid, Arc::new(Mutex::new(accessory)));
        Ok(aid)
    }

    /// Tear an accessory down and forget it
    pub fn remove_accessory(&self, aid: u64) -> Result<AccessoryInfo> {
        let accessory = self
            .accessories
            .write()
            .remove(&aid)
            .ok_or(BridgeError::AccessoryNotFound(aid))?;

        let mut accessory = accessory.lock();
        accessory.teardown(&self.hub);
        Ok(accessory.info().clone())
    }

    /// Apply a remote write, returning the commands issued in order
    pub fn write_characteristics(&self, aid: u64, batch: &WriteBatch) -> Result<Vec<ServiceCall>> {
        let accessory = self.accessory(aid)?;
        let mut accessory = accessory.lock();
        Ok(accessory.write_characteristics(batch, &self.context())?)
    }

    /// Current value of one characteristic
    pub fn characteristic(&self, aid: u64, characteristic: Characteristic) -> Option<CharValue> {
        self.accessory(aid).ok()?.lock().characteristic(characteristic)
    }

    /// Aids of every bridged accessory, ascending
    pub fn accessory_ids(&self) -> Vec<u64> {
        self.accessories.read().keys().copied().collect()
    }

    pub fn accessory_info(&self, aid: u64) -> Option<AccessoryInfo> {
        Some(self.accessory(aid).ok()?.lock().info().clone())
    }

    /// Declared service shape of an accessory
    pub fn service(&self, aid: u64) -> Option<ServiceDeclaration> {
        Some(self.accessory(aid).ok()?.lock().service().clone())
    }

    /// Blocking iterator over published characteristic values
    pub fn notifications(&self) -> ChangeIterator<Characteristic> {
        self.notifications.iter()
    }

    /// Stop the worker and tear every accessory down
    ///
    /// Called automatically on drop. Safe to call more than once.
    pub fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        let _ = self.command_tx.send(Command::Shutdown);
        if worker.join().is_err() {
            tracing::error!("Sync worker panicked");
        }

        let accessories = std::mem::take(&mut *self.accessories.write());
        for accessory in accessories.values() {
            accessory.lock().teardown(&self.hub);
        }

        tracing::info!(
            "Bridge '{}' shut down, {} accessories released",
            self.name,
            accessories.len()
        );
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        tracing::debug!(
            "Bridge '{}' dropping, {} active subscriptions",
            self.name,
            self.hub.subscription_count()
        );
        self.shutdown();
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("name", &self.name)
            .field("accessories", &self.accessory_ids())
            .field("hub", &self.hub)
            .finish()
    }
}

/// Builder for [`Bridge`]
pub struct BridgeBuilder {
    source: Option<Arc<dyn StateSource>>,
    caller: Option<Arc<dyn ServiceCaller>>,
    hub: Option<Arc<EventHub<SyncRoute>>>,
    config: BridgeConfig,
    poll_interval: Duration,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self {
            source: None,
            caller: None,
            hub: None,
            config: BridgeConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl BridgeBuilder {
    pub fn with_source(mut self, source: Arc<dyn StateSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_caller(mut self, caller: Arc<dyn ServiceCaller>) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Use one object as both state source and service caller
    pub fn with_source_system<S>(self, system: Arc<S>) -> Self
    where
        S: StateSource + ServiceCaller + 'static,
    {
        let source: Arc<dyn StateSource> = system.clone();
        let caller: Arc<dyn ServiceCaller> = system;
        self.with_source(source).with_caller(caller)
    }

    /// Share an existing hub instead of creating one
    pub fn with_hub(mut self, hub: Arc<EventHub<SyncRoute>>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start the worker and bridge every configured accessory
    ///
    /// Accessories that cannot be built are logged and skipped.
    pub fn build(self) -> Result<Bridge> {
        self.config.validate()?;

        let source = self.source.ok_or(BridgeError::MissingComponent("state source"))?;
        let caller = self.caller.ok_or(BridgeError::MissingComponent("service caller"))?;
        let hub = self.hub.unwrap_or_default();
        let accessories = Arc::new(RwLock::new(BTreeMap::new()));

        let (command_tx, command_rx) = mpsc::channel();
        let worker = spawn_sync_worker(
            WorkerContext {
                source: Arc::clone(&source),
                caller: Arc::clone(&caller),
                hub: Arc::clone(&hub),
                accessories: Arc::clone(&accessories),
                poll_interval: self.poll_interval,
            },
            command_rx,
        );

        let bridge = Bridge {
            name: self.config.name.clone(),
            source,
            caller,
            hub,
            accessories,
            notifications: NotificationChannel::new(),
            next_aid: AtomicU64::new(self.config.first_aid),
            command_tx,
            worker: Mutex::new(Some(worker)),
        };

        for config in self.config.accessories {
            let entity_id = config.entity_id.clone();
            match bridge.add_accessory(config) {
                Ok(aid) => tracing::debug!("Bridged {} as aid {}", entity_id, aid),
                Err(e) => tracing::warn!("Skipping {}: {}", entity_id, e),
            }
        }

        tracing::info!(
            "Bridge '{}' started with {} accessories",
            bridge.name,
            bridge.accessory_ids().len()
        );
        Ok(bridge)
    }
}
