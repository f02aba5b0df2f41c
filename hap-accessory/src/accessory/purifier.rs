//! Air purifier composite
//!
//! A fan entity exposed as an air purifier, optionally joined by a lock
//! switch, a filter life sensor and a motor rpm sensor. Power and speed go
//! through the shared fan module; mode, current state, lock and filter are
//! handled here.

use char_store::CharacteristicMap;
use entity_bus::{EntityId, ServiceCall, StateSnapshot};

use super::fan::{self, PowerPlan};
use super::{
    publish, Accessory, AccessoryBuilder, AccessoryHandler, AccessoryVariant, SyncContext,
    SyncTarget, WriteBatch,
};
use crate::catalog::{Category, Characteristic, Service};
use crate::coerce::{coerce_int, convert_to_float};
use crate::config::AccessoryConfig;
use crate::error::Result;
use crate::registry;

pub const TARGET_MANUAL: i64 = 0;
pub const TARGET_AUTOMATIC: i64 = 1;

pub const CURRENT_OFF: i64 = 0;
pub const CURRENT_INACTIVE: i64 = 1;
pub const CURRENT_ACTIVE: i64 = 2;

const LOCK_DOMAIN: &str = "switch";
const LOCK_ENGAGED: &str = "on";

#[derive(Debug, Clone)]
pub struct AirPurifier {
    entity_id: EntityId,
    lock: Option<EntityId>,
    filter: Option<EntityId>,
    motor: Option<EntityId>,
    manual_preset: String,
    auto_preset: String,
}

impl AirPurifier {
    pub fn build(aid: u64, config: &AccessoryConfig, ctx: &SyncContext<'_>) -> Result<Accessory> {
        let snapshot = ctx.require(&config.entity_id)?;
        let speed_properties = Characteristic::RotationSpeed
            .properties()
            .with_min_step(fan::percentage_step(&snapshot));

        let mut builder = AccessoryBuilder::new(
            aid,
            config,
            registry::AIR_PURIFIER,
            Category::AirPurifier,
            Service::AirPurifier,
        )
        .characteristic(Characteristic::Active, 0)
        .characteristic(Characteristic::CurrentAirPurifierState, CURRENT_OFF)
        .characteristic(Characteristic::TargetAirPurifierState, TARGET_MANUAL)
        .characteristic_with(Characteristic::RotationSpeed, 100.0, speed_properties);

        if config.lock_physical_controls.is_some() {
            builder = builder.characteristic(Characteristic::LockPhysicalControls, 0);
        }
        if config.filter_life_level.is_some() {
            builder = builder.characteristic(Characteristic::FilterLifeLevel, 0.0);
        }

        let purifier = AirPurifier {
            entity_id: config.entity_id.clone(),
            lock: config.lock_physical_controls.clone(),
            filter: config.filter_life_level.clone(),
            motor: config.motor_speed.clone(),
            manual_preset: config.manual_preset.clone(),
            auto_preset: config.auto_preset.clone(),
        };
        Ok(builder.finish(AccessoryVariant::AirPurifier(purifier), ctx))
    }

    pub fn lock(&self) -> Option<&EntityId> {
        self.lock.as_ref()
    }

    pub fn filter(&self) -> Option<&EntityId> {
        self.filter.as_ref()
    }

    pub fn motor(&self) -> Option<&EntityId> {
        self.motor.as_ref()
    }

    fn target_value(&self, snapshot: &StateSnapshot) -> Option<i64> {
        match snapshot.str_attribute(fan::ATTR_PRESET_MODE) {
            Some("") | None => None,
            Some(preset) if preset == self.manual_preset => Some(TARGET_MANUAL),
            Some(_) => Some(TARGET_AUTOMATIC),
        }
    }

    fn current_value(&self, snapshot: &StateSnapshot, ctx: &SyncContext<'_>) -> i64 {
        let powered = snapshot.is_state(fan::STATE_ON);
        if !powered {
            return CURRENT_OFF;
        }

        let Some(motor) = &self.motor else {
            return CURRENT_ACTIVE;
        };

        // Missing or non-integer readings count as a stopped motor
        let rpm = ctx
            .state(motor)
            .map_or(0, |motor_state| coerce_int(&motor_state.state));
        if rpm > 0 {
            CURRENT_ACTIVE
        } else {
            CURRENT_INACTIVE
        }
    }

    fn sync_state(&self, chars: &mut CharacteristicMap<Characteristic>, ctx: &SyncContext<'_>) {
        let Some(snapshot) = ctx.state(&self.entity_id) else {
            tracing::debug!("{} has no state, skipping", self.entity_id);
            return;
        };

        fan::sync_power_and_speed(chars, &snapshot);

        if let Some(target) = self.target_value(&snapshot) {
            publish(chars, Characteristic::TargetAirPurifierState, target);
        }

        let current = self.current_value(&snapshot, ctx);
        publish(chars, Characteristic::CurrentAirPurifierState, current);
    }

    fn sync_lock(&self, chars: &mut CharacteristicMap<Characteristic>, ctx: &SyncContext<'_>) {
        let Some(lock) = &self.lock else {
            return;
        };
        let Some(snapshot) = ctx.state(lock) else {
            tracing::debug!("Lock {} has no state, skipping", lock);
            return;
        };

        let engaged = snapshot.is_state(LOCK_ENGAGED);
        publish(chars, Characteristic::LockPhysicalControls, i64::from(engaged));
    }

    fn sync_filter(&self, chars: &mut CharacteristicMap<Characteristic>, ctx: &SyncContext<'_>) {
        let Some(filter) = &self.filter else {
            return;
        };
        let Some(snapshot) = ctx.state(filter) else {
            tracing::debug!("Filter sensor {} has no state, skipping", filter);
            return;
        };

        match convert_to_float(&snapshot.state) {
            Some(level) => publish(chars, Characteristic::FilterLifeLevel, level),
            None => tracing::debug!("{}: '{}' is not numeric, skipping", filter, snapshot.state),
        }
    }

    fn lock_command(&self, engage: bool) -> Option<ServiceCall> {
        let service = if engage {
            fan::SERVICE_TURN_ON
        } else {
            fan::SERVICE_TURN_OFF
        };
        self.lock
            .as_ref()
            .map(|lock| ServiceCall::new(LOCK_DOMAIN, service, lock.clone()))
    }
}

impl AccessoryHandler for AirPurifier {
    fn subscriptions(&self) -> Vec<(Vec<EntityId>, SyncTarget)> {
        let mut state_entities = vec![self.entity_id.clone()];
        state_entities.extend(self.motor.iter().cloned());

        let mut subscriptions = vec![(state_entities, SyncTarget::State)];
        if let Some(lock) = &self.lock {
            subscriptions.push((vec![lock.clone()], SyncTarget::PhysicalControls));
        }
        if let Some(filter) = &self.filter {
            subscriptions.push((vec![filter.clone()], SyncTarget::FilterLife));
        }
        subscriptions
    }

    fn sync(
        &self,
        target: SyncTarget,
        chars: &mut CharacteristicMap<Characteristic>,
        ctx: &SyncContext<'_>,
    ) {
        match target {
            SyncTarget::State => self.sync_state(chars, ctx),
            SyncTarget::PhysicalControls => self.sync_lock(chars, ctx),
            SyncTarget::FilterLife => self.sync_filter(chars, ctx),
        }
    }

    /// Power first, then mode, then speed, then the lock
    ///
    /// A power-off discards the rest of the batch, lock included.
    fn plan_write(
        &self,
        batch: &WriteBatch,
        _chars: &CharacteristicMap<Characteristic>,
        ctx: &SyncContext<'_>,
    ) -> Vec<ServiceCall> {
        let speed_capable = fan::supports_set_speed(ctx.state(&self.entity_id).as_ref());
        let mut commands = Vec::new();

        match fan::plan_power(&self.entity_id, batch, speed_capable) {
            PowerPlan::Off(call) => return vec![call],
            PowerPlan::Continue(power_on) => commands.extend(power_on),
        }

        if let Some(target) = batch.get(&Characteristic::TargetAirPurifierState) {
            if target.is_truthy() {
                commands.push(fan::set_preset_mode(&self.entity_id, &self.auto_preset));
            } else {
                commands.push(fan::turn_on(&self.entity_id));
            }
        }

        commands.extend(fan::plan_speed(&self.entity_id, batch));

        if let Some(lock) = batch.get(&Characteristic::LockPhysicalControls) {
            commands.extend(self.lock_command(lock.is_truthy()));
        }

        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use char_store::CharValue;
    use entity_bus::MemoryBus;
    use rstest::rstest;
    use serde_json::json;

    const PURIFIER: &str = "fan.bedroom_purifier";
    const LOCK: &str = "switch.purifier_child_lock";
    const FILTER: &str = "sensor.purifier_filter_life";
    const MOTOR: &str = "sensor.purifier_motor_speed";

    fn ctx(bus: &MemoryBus) -> SyncContext<'_> {
        SyncContext::new(bus, bus)
    }

    fn full_config() -> AccessoryConfig {
        AccessoryConfig::new(PURIFIER)
            .with_lock_physical_controls(LOCK)
            .with_filter_life_level(FILTER)
            .with_motor_speed(MOTOR)
    }

    fn services(calls: &[ServiceCall]) -> Vec<String> {
        calls.iter().map(|call| call.qualified_name()).collect()
    }

    #[test]
    fn test_priming_reads_every_linked_entity() {
        let bus = MemoryBus::new();
        bus.set_state(
            PURIFIER,
            "on",
            [("percentage", json!(40)), ("preset_mode", json!("Auto"))],
        );
        bus.set_state(LOCK, "on", Vec::<(String, serde_json::Value)>::new());
        bus.set_state(FILTER, "73", Vec::<(String, serde_json::Value)>::new());
        bus.set_state(MOTOR, "850", Vec::<(String, serde_json::Value)>::new());

        let accessory = AirPurifier::build(2, &full_config(), &ctx(&bus)).unwrap();
        assert_eq!(accessory.characteristic(Characteristic::Active), Some(CharValue::Int(1)));
        assert_eq!(accessory.characteristic(Characteristic::RotationSpeed), Some(CharValue::Float(40.0)));
        assert_eq!(
            accessory.characteristic(Characteristic::TargetAirPurifierState),
            Some(CharValue::Int(TARGET_AUTOMATIC))
        );
        assert_eq!(
            accessory.characteristic(Characteristic::CurrentAirPurifierState),
            Some(CharValue::Int(CURRENT_ACTIVE))
        );
        assert_eq!(accessory.characteristic(Characteristic::LockPhysicalControls), Some(CharValue::Int(1)));
        assert_eq!(accessory.characteristic(Characteristic::FilterLifeLevel), Some(CharValue::Float(73.0)));
        assert_eq!(accessory.info().category, Category::AirPurifier);
    }

    #[test]
    fn test_motor_drives_current_state() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "on", [("percentage", json!(20))]);
        bus.set_state(MOTOR, "0", Vec::<(String, serde_json::Value)>::new());

        let config = AccessoryConfig::new(PURIFIER).with_motor_speed(MOTOR);
        let mut accessory = AirPurifier::build(2, &config, &ctx(&bus)).unwrap();
        let current = |a: &Accessory| a.characteristic(Characteristic::CurrentAirPurifierState);
        assert_eq!(current(&accessory), Some(CharValue::Int(CURRENT_INACTIVE)));

        bus.set_state(MOTOR, "1200", Vec::<(String, serde_json::Value)>::new());
        accessory.handle(SyncTarget::State, &ctx(&bus));
        assert_eq!(current(&accessory), Some(CharValue::Int(CURRENT_ACTIVE)));

        bus.set_state(PURIFIER, "off", Vec::<(String, serde_json::Value)>::new());
        accessory.handle(SyncTarget::State, &ctx(&bus));
        assert_eq!(current(&accessory), Some(CharValue::Int(CURRENT_OFF)));
        assert_eq!(accessory.characteristic(Characteristic::RotationSpeed), Some(CharValue::Float(0.0)));
    }

    #[rstest]
    #[case(Some("unavailable"))]
    #[case(Some(""))]
    #[case(None)]
    fn test_unreadable_motor_is_inactive(#[case] motor_state: Option<&str>) {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "on", [("percentage", json!(40))]);
        if let Some(state) = motor_state {
            bus.set_state(MOTOR, state, Vec::<(String, serde_json::Value)>::new());
        }

        let config = AccessoryConfig::new(PURIFIER).with_motor_speed(MOTOR);
        let accessory = AirPurifier::build(2, &config, &ctx(&bus)).unwrap();
        assert_eq!(
            accessory.characteristic(Characteristic::CurrentAirPurifierState),
            Some(CharValue::Int(CURRENT_INACTIVE))
        );
    }

    #[test]
    fn test_manual_preset_maps_to_manual_target() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "on", [("preset_mode", json!("Manual"))]);

        let config = AccessoryConfig::new(PURIFIER).with_presets("Manual", "Smart");
        let accessory = AirPurifier::build(2, &config, &ctx(&bus)).unwrap();
        assert_eq!(
            accessory.characteristic(Characteristic::TargetAirPurifierState),
            Some(CharValue::Int(TARGET_MANUAL))
        );
    }

    #[test]
    fn test_speed_step_comes_from_entity() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "on", [("percentage", json!(0)), ("percentage_step", json!(25))]);

        let accessory = AirPurifier::build(2, &AccessoryConfig::new(PURIFIER), &ctx(&bus)).unwrap();
        assert_eq!(accessory.characteristic(Characteristic::RotationSpeed), Some(CharValue::Float(25.0)));
    }

    #[test]
    fn test_power_off_discards_rest_of_batch() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "on", [("percentage", json!(50))]);
        bus.set_state(LOCK, "off", Vec::<(String, serde_json::Value)>::new());

        let config = AccessoryConfig::new(PURIFIER).with_lock_physical_controls(LOCK);
        let mut accessory = AirPurifier::build(2, &config, &ctx(&bus)).unwrap();
        let batch = WriteBatch::from([
            (Characteristic::Active, CharValue::Int(0)),
            (Characteristic::RotationSpeed, CharValue::Float(80.0)),
            (Characteristic::TargetAirPurifierState, CharValue::Int(TARGET_AUTOMATIC)),
            (Characteristic::LockPhysicalControls, CharValue::Int(1)),
        ]);

        let issued = accessory.write_characteristics(&batch, &ctx(&bus)).unwrap();
        assert_eq!(services(&issued), vec!["fan.turn_off"]);
        assert_eq!(bus.calls(), issued);
    }

    #[test]
    fn test_mode_lands_before_speed() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "off", [("supported_features", json!(9))]);
        bus.set_state(LOCK, "off", Vec::<(String, serde_json::Value)>::new());

        let config = AccessoryConfig::new(PURIFIER).with_lock_physical_controls(LOCK);
        let mut accessory = AirPurifier::build(2, &config, &ctx(&bus)).unwrap();
        let batch = WriteBatch::from([
            (Characteristic::LockPhysicalControls, CharValue::Int(1)),
            (Characteristic::RotationSpeed, CharValue::Float(60.0)),
            (Characteristic::TargetAirPurifierState, CharValue::Int(TARGET_AUTOMATIC)),
            (Characteristic::Active, CharValue::Int(1)),
        ]);

        let issued = accessory.write_characteristics(&batch, &ctx(&bus)).unwrap();
        assert_eq!(
            services(&issued),
            vec!["fan.set_preset_mode", "fan.set_percentage", "switch.turn_on"]
        );
        assert_eq!(issued[0].data.get("preset_mode"), Some(&json!("Auto")));
        assert_eq!(issued[1].data.get("percentage"), Some(&json!(60)));
        assert_eq!(issued[2].entity_id.as_str(), LOCK);
    }

    #[test]
    fn test_power_on_kept_without_speed_support() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "off", [("supported_features", json!(0))]);

        let mut accessory = AirPurifier::build(2, &AccessoryConfig::new(PURIFIER), &ctx(&bus)).unwrap();
        let batch = WriteBatch::from([
            (Characteristic::Active, CharValue::Int(1)),
            (Characteristic::RotationSpeed, CharValue::Float(30.0)),
            (Characteristic::TargetAirPurifierState, CharValue::Int(TARGET_MANUAL)),
        ]);

        let issued = accessory.write_characteristics(&batch, &ctx(&bus)).unwrap();
        assert_eq!(
            services(&issued),
            vec!["fan.turn_on", "fan.turn_on", "fan.set_percentage"]
        );
    }

    #[test]
    fn test_rejected_command_does_not_stop_the_rest() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "on", Vec::<(String, serde_json::Value)>::new());
        bus.reject_calls(Some("unreachable"));

        let mut accessory = AirPurifier::build(2, &AccessoryConfig::new(PURIFIER), &ctx(&bus)).unwrap();
        let batch = WriteBatch::from([
            (Characteristic::TargetAirPurifierState, CharValue::Int(TARGET_AUTOMATIC)),
            (Characteristic::RotationSpeed, CharValue::Float(45.0)),
        ]);

        let issued = accessory.write_characteristics(&batch, &ctx(&bus)).unwrap();
        assert_eq!(issued.len(), 2);
        assert!(bus.calls().is_empty());
    }

    #[test]
    fn test_lock_write_without_lock_entity_is_rejected() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "on", Vec::<(String, serde_json::Value)>::new());

        let mut accessory = AirPurifier::build(7, &AccessoryConfig::new(PURIFIER), &ctx(&bus)).unwrap();
        let batch = WriteBatch::from([
            (Characteristic::Active, CharValue::Int(1)),
            (Characteristic::LockPhysicalControls, CharValue::Int(1)),
        ]);

        assert!(matches!(
            accessory.write_characteristics(&batch, &ctx(&bus)),
            Err(SyncError::NotWritable {
                aid: 7,
                characteristic: Characteristic::LockPhysicalControls
            })
        ));
        assert!(bus.calls().is_empty());
    }

    #[test]
    fn test_subscription_groups() {
        let bus = MemoryBus::new();
        bus.set_state(PURIFIER, "off", Vec::<(String, serde_json::Value)>::new());

        let accessory = AirPurifier::build(2, &full_config(), &ctx(&bus)).unwrap();
        let AccessoryVariant::AirPurifier(purifier) = accessory.variant() else {
            panic!("expected an air purifier");
        };

        let subscriptions = purifier.subscriptions();
        assert_eq!(subscriptions.len(), 3);
        assert_eq!(subscriptions[0].0, vec![EntityId::from(PURIFIER), EntityId::from(MOTOR)]);
        assert_eq!(subscriptions[1].1, SyncTarget::PhysicalControls);
        assert_eq!(subscriptions[2].1, SyncTarget::FilterLife);
    }
}
