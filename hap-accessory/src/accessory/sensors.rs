//! Scalar, gas and binary sensors
//!
//! All read-only. Each publishes the coerced primary state on every change;
//! an unparseable reading leaves the characteristics untouched.

use char_store::{CharValue, CharacteristicMap};
use entity_bus::EntityId;

use super::{
    publish, publish_if_changed, Accessory, AccessoryBuilder, AccessoryHandler, AccessoryVariant,
    SyncContext, SyncTarget,
};
use crate::catalog::{Category, Characteristic, Service};
use crate::coerce::{convert_to_float, temperature_to_homekit, TEMP_CELSIUS};
use crate::config::AccessoryConfig;
use crate::dispatch::{self, ServiceInfo};
use crate::error::Result;
use crate::registry;

/// Carbon monoxide level above which CO is reported as detected (ppm)
pub const THRESHOLD_CO: f64 = 25.0;

/// Carbon dioxide level above which CO2 is reported as detected (ppm)
pub const THRESHOLD_CO2: f64 = 1000.0;

/// States that count as "detected" for a binary sensor
const DETECTED_STATES: [&str; 2] = ["on", "home"];

// ============================================================================
// Scalar sensors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Temperature,
    Humidity,
    Light,
}

impl ScalarKind {
    pub fn service(&self) -> Service {
        match self {
            ScalarKind::Temperature => Service::TemperatureSensor,
            ScalarKind::Humidity => Service::HumiditySensor,
            ScalarKind::Light => Service::LightSensor,
        }
    }

    pub fn characteristic(&self) -> Characteristic {
        match self {
            ScalarKind::Temperature => Characteristic::CurrentTemperature,
            ScalarKind::Humidity => Characteristic::CurrentRelativeHumidity,
            ScalarKind::Light => Characteristic::CurrentAmbientLightLevel,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            ScalarKind::Temperature => registry::TEMPERATURE_SENSOR,
            ScalarKind::Humidity => registry::HUMIDITY_SENSOR,
            ScalarKind::Light => registry::LIGHT_SENSOR,
        }
    }
}

/// Temperature, humidity or light level sensor
#[derive(Debug, Clone)]
pub struct ScalarSensor {
    entity_id: EntityId,
    kind: ScalarKind,
}

impl ScalarSensor {
    pub fn build(
        aid: u64,
        config: &AccessoryConfig,
        kind: ScalarKind,
        ctx: &SyncContext<'_>,
    ) -> Result<Accessory> {
        ctx.require(&config.entity_id)?;

        let characteristic = kind.characteristic();
        let builder = AccessoryBuilder::new(aid, config, kind.kind_name(), Category::Sensor, kind.service())
            .characteristic(characteristic, characteristic.format().neutral());

        let sensor = ScalarSensor {
            entity_id: config.entity_id.clone(),
            kind,
        };
        Ok(builder.finish(AccessoryVariant::Scalar(sensor), ctx))
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }
}

impl AccessoryHandler for ScalarSensor {
    fn subscriptions(&self) -> Vec<(Vec<EntityId>, SyncTarget)> {
        vec![(vec![self.entity_id.clone()], SyncTarget::State)]
    }

    fn sync(
        &self,
        target: SyncTarget,
        chars: &mut CharacteristicMap<Characteristic>,
        ctx: &SyncContext<'_>,
    ) {
        if target != SyncTarget::State {
            return;
        }
        let Some(snapshot) = ctx.state(&self.entity_id) else {
            tracing::debug!("{} has no state, skipping", self.entity_id);
            return;
        };
        let Some(mut value) = convert_to_float(&snapshot.state) else {
            tracing::debug!("{}: '{}' is not numeric, skipping", self.entity_id, snapshot.state);
            return;
        };

        if self.kind == ScalarKind::Temperature {
            let unit = snapshot.unit_of_measurement().unwrap_or(TEMP_CELSIUS);
            value = temperature_to_homekit(value, unit);
        }

        publish(chars, self.kind.characteristic(), value);
    }
}

// ============================================================================
// Gas sensors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gas {
    CarbonMonoxide,
    CarbonDioxide,
}

impl Gas {
    pub fn service(&self) -> Service {
        match self {
            Gas::CarbonMonoxide => Service::CarbonMonoxideSensor,
            Gas::CarbonDioxide => Service::CarbonDioxideSensor,
        }
    }

    pub fn level(&self) -> Characteristic {
        match self {
            Gas::CarbonMonoxide => Characteristic::CarbonMonoxideLevel,
            Gas::CarbonDioxide => Characteristic::CarbonDioxideLevel,
        }
    }

    pub fn peak(&self) -> Characteristic {
        match self {
            Gas::CarbonMonoxide => Characteristic::CarbonMonoxidePeakLevel,
            Gas::CarbonDioxide => Characteristic::CarbonDioxidePeakLevel,
        }
    }

    pub fn detected(&self) -> Characteristic {
        match self {
            Gas::CarbonMonoxide => Characteristic::CarbonMonoxideDetected,
            Gas::CarbonDioxide => Characteristic::CarbonDioxideDetected,
        }
    }

    /// Detection threshold in ppm; detected means strictly above
    pub fn threshold(&self) -> f64 {
        match self {
            Gas::CarbonMonoxide => THRESHOLD_CO,
            Gas::CarbonDioxide => THRESHOLD_CO2,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Gas::CarbonMonoxide => registry::CARBON_MONOXIDE_SENSOR,
            Gas::CarbonDioxide => registry::CARBON_DIOXIDE_SENSOR,
        }
    }
}

/// Level sensor with a monotone peak and a threshold alarm
#[derive(Debug, Clone)]
pub struct GasSensor {
    entity_id: EntityId,
    gas: Gas,
}

impl GasSensor {
    pub fn build(
        aid: u64,
        config: &AccessoryConfig,
        gas: Gas,
        ctx: &SyncContext<'_>,
    ) -> Result<Accessory> {
        ctx.require(&config.entity_id)?;

        let builder = AccessoryBuilder::new(aid, config, gas.kind_name(), Category::Sensor, gas.service())
            .characteristic(gas.level(), 0.0)
            .characteristic(gas.peak(), 0.0)
            .characteristic(gas.detected(), 0);

        let sensor = GasSensor {
            entity_id: config.entity_id.clone(),
            gas,
        };
        Ok(builder.finish(AccessoryVariant::Gas(sensor), ctx))
    }

    pub fn gas(&self) -> Gas {
        self.gas
    }
}

impl AccessoryHandler for GasSensor {
    fn subscriptions(&self) -> Vec<(Vec<EntityId>, SyncTarget)> {
        vec![(vec![self.entity_id.clone()], SyncTarget::State)]
    }

    fn sync(
        &self,
        target: SyncTarget,
        chars: &mut CharacteristicMap<Characteristic>,
        ctx: &SyncContext<'_>,
    ) {
        if target != SyncTarget::State {
            return;
        }
        let Some(snapshot) = ctx.state(&self.entity_id) else {
            tracing::debug!("{} has no state, skipping", self.entity_id);
            return;
        };
        let Some(value) = convert_to_float(&snapshot.state) else {
            tracing::debug!("{}: '{}' is not numeric, skipping", self.entity_id, snapshot.state);
            return;
        };

        publish(chars, self.gas.level(), value);

        // The stored peak is clamped, so compare after coercion too
        let peak = chars.value(self.gas.peak()).map_or(0.0, |v| v.as_f64());
        if value > peak {
            publish_if_changed(chars, self.gas.peak(), value);
        }

        // Detection follows the raw reading, not the clamped level
        let detected = value > self.gas.threshold();
        publish(chars, self.gas.detected(), CharValue::Int(i64::from(detected)));
    }
}

// ============================================================================
// Binary sensors
// ============================================================================

/// On/off sensor exposed through the dispatch table
#[derive(Debug, Clone)]
pub struct BinarySensor {
    entity_id: EntityId,
    info: ServiceInfo,
}

impl BinarySensor {
    pub fn build(aid: u64, config: &AccessoryConfig, ctx: &SyncContext<'_>) -> Result<Accessory> {
        let snapshot = ctx.require(&config.entity_id)?;
        let info = dispatch::lookup(snapshot.device_class());

        let builder = AccessoryBuilder::new(
            aid,
            config,
            registry::BINARY_SENSOR,
            Category::Sensor,
            info.service,
        )
        .characteristic(info.characteristic, info.format.initial());

        let sensor = BinarySensor {
            entity_id: config.entity_id.clone(),
            info,
        };
        Ok(builder.finish(AccessoryVariant::Binary(sensor), ctx))
    }

    pub fn service_info(&self) -> ServiceInfo {
        self.info
    }
}

impl AccessoryHandler for BinarySensor {
    fn subscriptions(&self) -> Vec<(Vec<EntityId>, SyncTarget)> {
        vec![(vec![self.entity_id.clone()], SyncTarget::State)]
    }

    fn sync(
        &self,
        target: SyncTarget,
        chars: &mut CharacteristicMap<Characteristic>,
        ctx: &SyncContext<'_>,
    ) {
        if target != SyncTarget::State {
            return;
        }
        let Some(snapshot) = ctx.state(&self.entity_id) else {
            tracing::debug!("{} has no state, skipping", self.entity_id);
            return;
        };

        let detected = DETECTED_STATES.contains(&snapshot.state.as_str());
        publish(chars, self.info.characteristic, self.info.format.format(detected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use char_store::NotificationChannel;
    use entity_bus::{EventHub, MemoryBus};
    use rstest::rstest;
    use serde_json::{json, Value};

    fn ctx(bus: &MemoryBus) -> SyncContext<'_> {
        SyncContext::new(bus, bus)
    }

    fn no_attrs() -> Vec<(String, Value)> {
        Vec::new()
    }

    #[rstest]
    #[case("22.4", "°C", 22.4)]
    #[case("72", "°F", 22.2)]
    fn test_temperature_is_published_in_celsius(
        #[case] state: &str,
        #[case] unit: &str,
        #[case] expected: f64,
    ) {
        let bus = MemoryBus::new();
        bus.set_state("sensor.office", state, [("unit_of_measurement", json!(unit))]);

        let config = AccessoryConfig::new("sensor.office");
        let accessory = ScalarSensor::build(2, &config, ScalarKind::Temperature, &ctx(&bus)).unwrap();

        let value = accessory.characteristic(Characteristic::CurrentTemperature).unwrap();
        assert!((value.as_f64() - expected).abs() < 1e-9);
        assert_eq!(accessory.service().service, Service::TemperatureSensor);
    }

    #[test]
    fn test_invalid_reading_leaves_value_untouched() {
        let bus = MemoryBus::new();
        bus.set_state("sensor.lux", "320", no_attrs());

        let config = AccessoryConfig::new("sensor.lux");
        let mut accessory = ScalarSensor::build(2, &config, ScalarKind::Light, &ctx(&bus)).unwrap();

        for garbage in ["unavailable", "", "n/a"] {
            bus.set_state("sensor.lux", garbage, no_attrs());
            accessory.handle(SyncTarget::State, &ctx(&bus));
            assert_eq!(
                accessory.characteristic(Characteristic::CurrentAmbientLightLevel),
                Some(CharValue::Float(320.0))
            );
        }
    }

    #[test]
    fn test_missing_entity_fails_construction() {
        let bus = MemoryBus::new();
        let config = AccessoryConfig::new("sensor.ghost");
        assert!(ScalarSensor::build(2, &config, ScalarKind::Humidity, &ctx(&bus)).is_err());
    }

    #[test]
    fn test_unparseable_initial_state_keeps_neutral_value() {
        let bus = MemoryBus::new();
        bus.set_state("sensor.humidity", "unknown", no_attrs());

        let config = AccessoryConfig::new("sensor.humidity");
        let accessory = ScalarSensor::build(2, &config, ScalarKind::Humidity, &ctx(&bus)).unwrap();
        assert_eq!(
            accessory.characteristic(Characteristic::CurrentRelativeHumidity),
            Some(CharValue::Float(0.0))
        );
    }

    #[test]
    fn test_co_peak_and_detection() {
        let bus = MemoryBus::new();
        bus.set_state("sensor.garage_co", "10", no_attrs());

        let config = AccessoryConfig::new("sensor.garage_co");
        let mut accessory = GasSensor::build(2, &config, Gas::CarbonMonoxide, &ctx(&bus)).unwrap();
        assert_eq!(accessory.characteristic(Characteristic::CarbonMonoxideDetected), Some(CharValue::Int(0)));

        bus.set_state("sensor.garage_co", "30", no_attrs());
        accessory.handle(SyncTarget::State, &ctx(&bus));
        assert_eq!(accessory.characteristic(Characteristic::CarbonMonoxidePeakLevel), Some(CharValue::Float(30.0)));
        assert_eq!(accessory.characteristic(Characteristic::CarbonMonoxideDetected), Some(CharValue::Int(1)));

        bus.set_state("sensor.garage_co", "5", no_attrs());
        accessory.handle(SyncTarget::State, &ctx(&bus));
        assert_eq!(accessory.characteristic(Characteristic::CarbonMonoxideLevel), Some(CharValue::Float(5.0)));
        assert_eq!(accessory.characteristic(Characteristic::CarbonMonoxidePeakLevel), Some(CharValue::Float(30.0)));
        assert_eq!(accessory.characteristic(Characteristic::CarbonMonoxideDetected), Some(CharValue::Int(0)));
    }

    #[test]
    fn test_peak_above_range_is_published_once() {
        let bus = MemoryBus::new();
        bus.set_state("sensor.garage_co", "10", no_attrs());

        let config = AccessoryConfig::new("sensor.garage_co");
        let mut accessory = GasSensor::build(2, &config, Gas::CarbonMonoxide, &ctx(&bus)).unwrap();
        let hub = EventHub::new();
        let channel = NotificationChannel::new();
        accessory.run(&hub, Some(channel.sender()));

        for reading in ["150", "150", "180"] {
            bus.set_state("sensor.garage_co", reading, no_attrs());
            accessory.handle(SyncTarget::State, &ctx(&bus));
        }

        let peaks: Vec<f64> = channel
            .iter()
            .try_iter()
            .filter(|change| change.key == Characteristic::CarbonMonoxidePeakLevel)
            .map(|change| change.value.as_f64())
            .collect();
        assert_eq!(peaks, vec![100.0]);
        assert_eq!(accessory.characteristic(Characteristic::CarbonMonoxideDetected), Some(CharValue::Int(1)));
    }

    #[rstest]
    #[case("1000", 0)]
    #[case("1000.5", 1)]
    #[case("999", 0)]
    fn test_co2_threshold_is_strict(#[case] state: &str, #[case] detected: i64) {
        let bus = MemoryBus::new();
        bus.set_state("sensor.co2", state, no_attrs());

        let config = AccessoryConfig::new("sensor.co2");
        let accessory = GasSensor::build(2, &config, Gas::CarbonDioxide, &ctx(&bus)).unwrap();
        assert_eq!(
            accessory.characteristic(Characteristic::CarbonDioxideDetected),
            Some(CharValue::Int(detected))
        );
    }

    #[rstest]
    #[case("motion", "on", Characteristic::MotionDetected, CharValue::Bool(true))]
    #[case("motion", "off", Characteristic::MotionDetected, CharValue::Bool(false))]
    #[case("door", "on", Characteristic::ContactSensorState, CharValue::Int(1))]
    #[case("occupancy", "home", Characteristic::OccupancyDetected, CharValue::Int(1))]
    #[case("tamper", "on", Characteristic::OccupancyDetected, CharValue::Int(1))]
    #[case("smoke", "unavailable", Characteristic::SmokeDetected, CharValue::Int(0))]
    fn test_binary_sensor_states(
        #[case] class: &str,
        #[case] state: &str,
        #[case] characteristic: Characteristic,
        #[case] expected: CharValue,
    ) {
        let bus = MemoryBus::new();
        bus.set_state("binary_sensor.thing", state, [("device_class", json!(class))]);

        let config = AccessoryConfig::new("binary_sensor.thing");
        let accessory = BinarySensor::build(2, &config, &ctx(&bus)).unwrap();

        let value = accessory.characteristic(characteristic).unwrap();
        assert_eq!(value, expected);
        assert_eq!(value.format(), expected.format());
    }
}
