//! Accessories and their sync handlers
//!
//! An `Accessory` owns one characteristic map, the tokens of its
//! subscriptions, and a closed `AccessoryVariant` that carries the
//! kind-specific configuration and handlers.
//!
//! Lifecycle:
//!
//! ```text
//! build ──► prime (forward sync, no notifier) ──► run (notifier + subscriptions)
//!                                                   │
//!                    handle(target) ◄── deliveries ─┤
//!                    write_characteristics(batch) ◄─┤
//!                                                   ▼
//!                                             teardown (tokens released)
//! ```

pub mod air_quality;
pub mod fan;
pub mod purifier;
pub mod sensors;

use std::collections::HashMap;
use std::sync::mpsc;

use char_store::{CharProperties, CharValue, CharacteristicMap, ValueChange};
use entity_bus::{
    EntityId, EventHub, ServiceCall, ServiceCaller, StateSnapshot, StateSource, SubscriptionToken,
};
use serde::Serialize;

use crate::catalog::{Category, Characteristic, Service, ServiceDeclaration};
use crate::config::AccessoryConfig;
use crate::error::{Result, SyncError};

pub use air_quality::AirQualitySensor;
pub use purifier::AirPurifier;
pub use sensors::{BinarySensor, Gas, GasSensor, ScalarKind, ScalarSensor};

/// Requested values from one remote write, keyed by characteristic
pub type WriteBatch = HashMap<Characteristic, CharValue>;

/// Sender half of the characteristic notification channel
pub type Notifier = mpsc::Sender<ValueChange<Characteristic>>;

/// The source system as seen by a handler invocation
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub source: &'a dyn StateSource,
    pub caller: &'a dyn ServiceCaller,
}

impl<'a> SyncContext<'a> {
    pub fn new(source: &'a dyn StateSource, caller: &'a dyn ServiceCaller) -> Self {
        Self { source, caller }
    }

    /// Fresh snapshot of an entity
    pub fn state(&self, entity_id: &EntityId) -> Option<StateSnapshot> {
        self.source.state(entity_id)
    }

    /// Snapshot that must exist
    pub fn require(&self, entity_id: &EntityId) -> Result<StateSnapshot> {
        self.state(entity_id)
            .ok_or_else(|| SyncError::EntityNotFound(entity_id.clone()))
    }

    /// Issue a command, logging a rejection
    ///
    /// Returns whether the source system accepted it.
    pub fn issue(&self, call: ServiceCall) -> bool {
        let description = call.to_string();
        tracing::debug!("Issuing {}", description);

        match self.caller.call_service(call) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Command {} failed: {}", description, e);
                false
            }
        }
    }
}

/// Which handler a delivery is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyncTarget {
    /// Primary state, plus linked entities that feed into it
    State,
    /// Linked physical lock switch
    PhysicalControls,
    /// Linked filter life sensor
    FilterLife,
}

impl SyncTarget {
    /// Priming order at construction
    pub const PRIMING_ORDER: [SyncTarget; 3] = [
        SyncTarget::State,
        SyncTarget::PhysicalControls,
        SyncTarget::FilterLife,
    ];
}

/// Route carried by every subscription an accessory registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncRoute {
    pub aid: u64,
    pub target: SyncTarget,
}

/// Static description of an accessory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessoryInfo {
    pub aid: u64,
    pub name: String,
    pub entity_id: EntityId,
    pub kind: &'static str,
    pub category: Category,
    pub service: ServiceDeclaration,
}

/// Kind-specific sync behavior
pub trait AccessoryHandler {
    /// Entity groups to subscribe, each with the target its changes run
    fn subscriptions(&self) -> Vec<(Vec<EntityId>, SyncTarget)>;

    /// Forward sync: read current state and publish characteristic values
    fn sync(
        &self,
        target: SyncTarget,
        chars: &mut CharacteristicMap<Characteristic>,
        ctx: &SyncContext<'_>,
    );

    /// Reverse sync: translate a validated batch into ordered commands
    ///
    /// Read-only kinds keep the default.
    fn plan_write(
        &self,
        _batch: &WriteBatch,
        _chars: &CharacteristicMap<Characteristic>,
        _ctx: &SyncContext<'_>,
    ) -> Vec<ServiceCall> {
        Vec::new()
    }
}

/// Closed set of accessory kinds
#[derive(Debug, Clone)]
pub enum AccessoryVariant {
    Scalar(ScalarSensor),
    Gas(GasSensor),
    Binary(BinarySensor),
    AirQuality(AirQualitySensor),
    AirPurifier(AirPurifier),
}

impl AccessoryVariant {
    fn handler(&self) -> &dyn AccessoryHandler {
        match self {
            AccessoryVariant::Scalar(h) => h,
            AccessoryVariant::Gas(h) => h,
            AccessoryVariant::Binary(h) => h,
            AccessoryVariant::AirQuality(h) => h,
            AccessoryVariant::AirPurifier(h) => h,
        }
    }
}

/// Publish a value and log it
pub(crate) fn publish(
    chars: &mut CharacteristicMap<Characteristic>,
    characteristic: Characteristic,
    value: impl Into<CharValue>,
) {
    let value = value.into();
    match chars.set_value(characteristic, value) {
        Some(_) => tracing::debug!("aid {}: {} = {}", chars.aid(), characteristic, value),
        None => tracing::warn!(
            "aid {}: {} is not configured, dropping {}",
            chars.aid(),
            characteristic,
            value
        ),
    }
}

/// Publish only when the coerced value differs from the stored one
///
/// Returns whether a publish happened.
pub(crate) fn publish_if_changed(
    chars: &mut CharacteristicMap<Characteristic>,
    characteristic: Characteristic,
    value: impl Into<CharValue>,
) -> bool {
    let value = value.into();
    let unchanged = chars
        .get(characteristic)
        .map_or(false, |handle| handle.properties().to_valid_value(value) == handle.value());

    if unchanged {
        tracing::trace!("aid {}: {} unchanged at {}", chars.aid(), characteristic, value);
        return false;
    }

    publish(chars, characteristic, value);
    true
}

/// Collects the declaration and characteristic map while a kind is built
pub(crate) struct AccessoryBuilder {
    info: AccessoryInfo,
    chars: CharacteristicMap<Characteristic>,
}

impl AccessoryBuilder {
    pub(crate) fn new(
        aid: u64,
        config: &AccessoryConfig,
        kind: &'static str,
        category: Category,
        service: Service,
    ) -> Self {
        Self {
            info: AccessoryInfo {
                aid,
                name: config.display_name(),
                entity_id: config.entity_id.clone(),
                kind,
                category,
                service: ServiceDeclaration::new(service),
            },
            chars: CharacteristicMap::new(aid),
        }
    }

    /// Declare a characteristic with its catalog properties
    pub(crate) fn characteristic(
        self,
        characteristic: Characteristic,
        initial: impl Into<CharValue>,
    ) -> Self {
        let properties = characteristic.properties();
        self.characteristic_with(characteristic, initial, properties)
    }

    pub(crate) fn characteristic_with(
        mut self,
        characteristic: Characteristic,
        initial: impl Into<CharValue>,
        properties: CharProperties,
    ) -> Self {
        if self.chars.configure(characteristic, initial.into(), properties) {
            self.info.service = self.info.service.with(characteristic);
        }
        self
    }

    /// Finish construction and prime from current state
    pub(crate) fn finish(self, variant: AccessoryVariant, ctx: &SyncContext<'_>) -> Accessory {
        let mut accessory = Accessory {
            info: self.info,
            chars: self.chars,
            variant,
            subscriptions: Vec::new(),
        };
        accessory.prime(ctx);
        accessory
    }
}

/// One exposed accessory
pub struct Accessory {
    info: AccessoryInfo,
    chars: CharacteristicMap<Characteristic>,
    variant: AccessoryVariant,
    subscriptions: Vec<SubscriptionToken>,
}

impl Accessory {
    pub fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    pub fn aid(&self) -> u64 {
        self.info.aid
    }

    pub fn variant(&self) -> &AccessoryVariant {
        &self.variant
    }

    pub fn service(&self) -> &ServiceDeclaration {
        &self.info.service
    }

    /// Current value of a characteristic
    pub fn characteristic(&self, characteristic: Characteristic) -> Option<CharValue> {
        self.chars.value(characteristic)
    }

    pub fn characteristics(&self) -> &CharacteristicMap<Characteristic> {
        &self.chars
    }

    /// Tokens of the subscriptions registered by `run`
    pub fn subscriptions(&self) -> &[SubscriptionToken] {
        &self.subscriptions
    }

    pub fn is_running(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Whether a delivery carrying `token` belongs to this accessory
    pub fn owns(&self, token: SubscriptionToken) -> bool {
        self.subscriptions.contains(&token)
    }

    /// Whether any characteristic accepts remote writes
    pub fn is_writable(&self) -> bool {
        self.chars.keys().iter().any(|c| c.is_writable())
    }

    /// Run every handler once against current state
    ///
    /// Called at construction, before a notifier is attached, so the first
    /// read after start-up already sees real values.
    fn prime(&mut self, ctx: &SyncContext<'_>) {
        tracing::debug!("Priming {} ({})", self.info.entity_id, self.info.kind);
        for target in SyncTarget::PRIMING_ORDER {
            self.variant.handler().sync(target, &mut self.chars, ctx);
        }
    }

    /// Start the accessory: attach the notifier and subscribe
    pub fn run(&mut self, hub: &EventHub<SyncRoute>, notifier: Option<Notifier>) {
        if let Some(notifier) = notifier {
            self.chars.set_notifier(notifier);
        }

        for (entities, target) in self.variant.handler().subscriptions() {
            let route = SyncRoute {
                aid: self.info.aid,
                target,
            };
            self.subscriptions.push(hub.subscribe(entities, route));
        }

        tracing::info!(
            "Started {} '{}' (aid {}) with {} subscriptions",
            self.info.kind,
            self.info.name,
            self.info.aid,
            self.subscriptions.len()
        );
    }

    /// Forward sync for one delivery
    pub fn handle(&mut self, target: SyncTarget, ctx: &SyncContext<'_>) {
        self.variant.handler().sync(target, &mut self.chars, ctx);
    }

    /// Reverse sync for one remote write
    ///
    /// Every key is validated before any command is issued. Commands are
    /// fire-and-forget: a rejected one is logged and the rest still go out.
    /// Returns the commands issued, in order.
    pub fn write_characteristics(
        &mut self,
        batch: &WriteBatch,
        ctx: &SyncContext<'_>,
    ) -> Result<Vec<ServiceCall>> {
        if !self.is_writable() {
            return Err(SyncError::ReadOnly { aid: self.info.aid });
        }

        let rejected = batch
            .keys()
            .copied()
            .filter(|c| !c.is_writable() || !self.chars.contains(*c))
            .min();
        if let Some(characteristic) = rejected {
            return Err(SyncError::NotWritable {
                aid: self.info.aid,
                characteristic,
            });
        }

        tracing::debug!("aid {}: write {:?}", self.info.aid, batch);
        let commands = self.variant.handler().plan_write(batch, &self.chars, ctx);
        for call in &commands {
            ctx.issue(call.clone());
        }
        Ok(commands)
    }

    /// Release every subscription and detach the notifier
    ///
    /// Deliveries already queued for the released tokens are ignored by
    /// `owns`. Safe to call more than once.
    pub fn teardown(&mut self, hub: &EventHub<SyncRoute>) {
        for token in self.subscriptions.drain(..) {
            if let Err(e) = hub.unsubscribe(token) {
                tracing::warn!("aid {}: {}", self.info.aid, e);
            }
        }
        self.chars.clear_notifier();
        tracing::info!("Stopped '{}' (aid {})", self.info.name, self.info.aid);
    }
}

impl std::fmt::Debug for Accessory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessory")
            .field("info", &self.info)
            .field("characteristics", &self.chars)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}
