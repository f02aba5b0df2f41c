//! Air quality composite
//!
//! Merges the accessory's own particulate sensor with an optional linked
//! one. Each entity feeds PM2.5 or PM10 according to its declared class.
//! Densities are only republished when they change. A zero reading neither
//! publishes a density nor triggers the air quality recompute.

use char_store::CharacteristicMap;
use entity_bus::{EntityId, StateSnapshot};

use super::{
    publish, publish_if_changed, Accessory, AccessoryBuilder, AccessoryHandler, AccessoryVariant,
    SyncContext, SyncTarget,
};
use crate::catalog::{Category, Characteristic, Service};
use crate::coerce::{convert_to_float, density_to_air_quality, AirQuality};
use crate::config::AccessoryConfig;
use crate::error::Result;
use crate::registry;

pub const CLASS_PM25: &str = "pm25";
pub const CLASS_PM10: &str = "pm10";

/// Particulate readings gathered for one sync
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Readings {
    pm25: Option<f64>,
    pm10: Option<f64>,
}

impl Readings {
    fn read(&mut self, snapshot: &StateSnapshot) {
        match snapshot.device_class() {
            Some(CLASS_PM25) => self.pm25 = convert_to_float(&snapshot.state),
            Some(CLASS_PM10) => self.pm10 = convert_to_float(&snapshot.state),
            other => tracing::debug!(
                "{}: class {:?} carries no particulate density",
                snapshot.entity_id,
                other
            ),
        }
    }
}

/// Zero readings count as absent
fn present(reading: Option<f64>) -> Option<f64> {
    reading.filter(|value| *value != 0.0)
}

#[derive(Debug, Clone)]
pub struct AirQualitySensor {
    entity_id: EntityId,
    linked_density_sensor: Option<EntityId>,
}

impl AirQualitySensor {
    pub fn build(aid: u64, config: &AccessoryConfig, ctx: &SyncContext<'_>) -> Result<Accessory> {
        ctx.require(&config.entity_id)?;

        let builder = AccessoryBuilder::new(
            aid,
            config,
            registry::AIR_QUALITY_SENSOR,
            Category::Sensor,
            Service::AirQualitySensor,
        )
        .characteristic(Characteristic::AirQuality, AirQuality::Unknown.level())
        .characteristic(Characteristic::Pm25Density, 0.0)
        .characteristic(Characteristic::Pm10Density, 0.0);

        let sensor = AirQualitySensor {
            entity_id: config.entity_id.clone(),
            linked_density_sensor: config.linked_density_sensor.clone(),
        };
        Ok(builder.finish(AccessoryVariant::AirQuality(sensor), ctx))
    }

    pub fn linked_density_sensor(&self) -> Option<&EntityId> {
        self.linked_density_sensor.as_ref()
    }

    fn readings(&self, ctx: &SyncContext<'_>) -> Readings {
        let mut readings = Readings::default();

        match ctx.state(&self.entity_id) {
            Some(snapshot) => readings.read(&snapshot),
            None => tracing::debug!("{} has no state", self.entity_id),
        }

        if let Some(linked) = &self.linked_density_sensor {
            match ctx.state(linked) {
                Some(snapshot) => readings.read(&snapshot),
                None => tracing::debug!("Linked density sensor {} has no state", linked),
            }
        }

        readings
    }
}

impl AccessoryHandler for AirQualitySensor {
    fn subscriptions(&self) -> Vec<(Vec<EntityId>, SyncTarget)> {
        let mut entities = vec![self.entity_id.clone()];
        entities.extend(self.linked_density_sensor.iter().cloned());
        vec![(entities, SyncTarget::State)]
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

        let readings = self.readings(ctx);
        let pm25 = present(readings.pm25);
        let pm10 = present(readings.pm10);

        if let Some(density) = pm25 {
            publish_if_changed(chars, Characteristic::Pm25Density, density);
        }
        if let Some(density) = pm10 {
            publish_if_changed(chars, Characteristic::Pm10Density, density);
        }

        if pm25.is_some() || pm10.is_some() {
            let quality = density_to_air_quality(readings.pm25, readings.pm10);
            publish(chars, Characteristic::AirQuality, quality.level());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use char_store::{CharValue, NotificationChannel};
    use entity_bus::{EventHub, MemoryBus};
    use serde_json::json;

    fn ctx(bus: &MemoryBus) -> SyncContext<'_> {
        SyncContext::new(bus, bus)
    }

    fn pm25(bus: &MemoryBus, state: &str) {
        bus.set_state("sensor.pm25", state, [("device_class", json!(CLASS_PM25))]);
    }

    fn pm10(bus: &MemoryBus, state: &str) {
        bus.set_state("sensor.pm10", state, [("device_class", json!(CLASS_PM10))]);
    }

    fn composite(bus: &MemoryBus) -> Accessory {
        let config = AccessoryConfig::new("sensor.pm25").with_density_sensor("sensor.pm10");
        AirQualitySensor::build(5, &config, &ctx(bus)).unwrap()
    }

    #[test]
    fn test_both_densities_feed_air_quality() {
        let bus = MemoryBus::new();
        pm25(&bus, "8");
        pm10(&bus, "180");

        let accessory = composite(&bus);
        assert_eq!(accessory.characteristic(Characteristic::Pm25Density), Some(CharValue::Float(8.0)));
        assert_eq!(accessory.characteristic(Characteristic::Pm10Density), Some(CharValue::Float(180.0)));
        assert_eq!(
            accessory.characteristic(Characteristic::AirQuality),
            Some(CharValue::Int(AirQuality::Fair.level()))
        );
    }

    #[test]
    fn test_repeated_density_publishes_once() {
        let bus = MemoryBus::new();
        pm25(&bus, "0");
        let mut accessory = composite(&bus);

        let hub = EventHub::new();
        let channel = NotificationChannel::new();
        accessory.run(&hub, Some(channel.sender()));

        pm25(&bus, "14");
        accessory.handle(SyncTarget::State, &ctx(&bus));
        accessory.handle(SyncTarget::State, &ctx(&bus));
        pm25(&bus, "16");
        accessory.handle(SyncTarget::State, &ctx(&bus));

        let density_publishes: Vec<f64> = channel
            .iter()
            .try_iter()
            .filter(|change| change.key == Characteristic::Pm25Density)
            .map(|change| change.value.as_f64())
            .collect();
        assert_eq!(density_publishes, vec![14.0, 16.0]);
    }

    #[test]
    fn test_zero_reading_counts_as_absent() {
        let bus = MemoryBus::new();
        pm25(&bus, "40");
        let mut accessory = composite(&bus);
        assert_eq!(
            accessory.characteristic(Characteristic::AirQuality),
            Some(CharValue::Int(AirQuality::Fair.level()))
        );

        // A true zero neither updates the density nor recomputes quality
        pm25(&bus, "0");
        accessory.handle(SyncTarget::State, &ctx(&bus));
        assert_eq!(accessory.characteristic(Characteristic::Pm25Density), Some(CharValue::Float(40.0)));
        assert_eq!(
            accessory.characteristic(Characteristic::AirQuality),
            Some(CharValue::Int(AirQuality::Fair.level()))
        );
    }

    #[test]
    fn test_missing_linked_sensor_is_steady_state() {
        let bus = MemoryBus::new();
        pm10(&bus, "30");

        let config = AccessoryConfig::new("sensor.pm10").with_density_sensor("sensor.not_there");
        let accessory = AirQualitySensor::build(5, &config, &ctx(&bus)).unwrap();
        assert_eq!(accessory.characteristic(Characteristic::Pm10Density), Some(CharValue::Float(30.0)));
        assert_eq!(accessory.characteristic(Characteristic::Pm25Density), Some(CharValue::Float(0.0)));
        assert_eq!(
            accessory.characteristic(Characteristic::AirQuality),
            Some(CharValue::Int(AirQuality::Excellent.level()))
        );
    }

    #[test]
    fn test_subscribes_primary_and_linked_together() {
        let bus = MemoryBus::new();
        pm25(&bus, "3");
        let accessory = composite(&bus);

        let variant = match accessory.variant() {
            AccessoryVariant::AirQuality(sensor) => sensor.clone(),
            other => panic!("unexpected variant {:?}", other),
        };
        let subscriptions = variant.subscriptions();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(
            subscriptions[0].0,
            vec![EntityId::from("sensor.pm25"), EntityId::from("sensor.pm10")]
        );
    }
}
