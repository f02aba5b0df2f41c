//! Accessory constructor table
//!
//! A read-only map from kind name to constructor, built once on first use
//! and shared for the life of the process. Selection is a pure lookup: the
//! config's `kind` wins, otherwise the entity's domain and declared class
//! decide.

use std::collections::BTreeMap;

use entity_bus::StateSnapshot;
use once_cell::sync::Lazy;

use crate::accessory::{
    Accessory, AirPurifier, AirQualitySensor, BinarySensor, Gas, GasSensor, ScalarKind,
    ScalarSensor, SyncContext,
};
use crate::coerce::{TEMP_CELSIUS, TEMP_FAHRENHEIT};
use crate::config::AccessoryConfig;
use crate::error::{Result, SyncError};

pub const TEMPERATURE_SENSOR: &str = "TemperatureSensor";
pub const HUMIDITY_SENSOR: &str = "HumiditySensor";
pub const LIGHT_SENSOR: &str = "LightSensor";
pub const CARBON_MONOXIDE_SENSOR: &str = "CarbonMonoxideSensor";
pub const CARBON_DIOXIDE_SENSOR: &str = "CarbonDioxideSensor";
pub const BINARY_SENSOR: &str = "BinarySensor";
pub const AIR_QUALITY_SENSOR: &str = "AirQualitySensor";
pub const AIR_PURIFIER: &str = "AirPurifier";

/// Builds and primes one accessory
pub type Constructor = fn(u64, &AccessoryConfig, &SyncContext<'_>) -> Result<Accessory>;

static REGISTRY: Lazy<BTreeMap<&'static str, Constructor>> = Lazy::new(|| {
    let mut table: BTreeMap<&'static str, Constructor> = BTreeMap::new();
    table.insert(TEMPERATURE_SENSOR, |aid, config, ctx| {
        ScalarSensor::build(aid, config, ScalarKind::Temperature, ctx)
    });
    table.insert(HUMIDITY_SENSOR, |aid, config, ctx| {
        ScalarSensor::build(aid, config, ScalarKind::Humidity, ctx)
    });
    table.insert(LIGHT_SENSOR, |aid, config, ctx| {
        ScalarSensor::build(aid, config, ScalarKind::Light, ctx)
    });
    table.insert(CARBON_MONOXIDE_SENSOR, |aid, config, ctx| {
        GasSensor::build(aid, config, Gas::CarbonMonoxide, ctx)
    });
    table.insert(CARBON_DIOXIDE_SENSOR, |aid, config, ctx| {
        GasSensor::build(aid, config, Gas::CarbonDioxide, ctx)
    });
    table.insert(BINARY_SENSOR, BinarySensor::build);
    table.insert(AIR_QUALITY_SENSOR, AirQualitySensor::build);
    table.insert(AIR_PURIFIER, AirPurifier::build);

    tracing::debug!("Accessory registry initialized with {} kinds", table.len());
    table
});

/// Constructor registered under `kind`
pub fn constructor(kind: &str) -> Option<Constructor> {
    REGISTRY.get(kind).copied()
}

/// Every registered kind name, sorted
pub fn kinds() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}

pub fn is_registered(kind: &str) -> bool {
    REGISTRY.contains_key(kind)
}

/// Kind name for an entity, `None` when nothing maps it
pub fn accessory_kind_for<'a>(
    snapshot: &StateSnapshot,
    config: &'a AccessoryConfig,
) -> Option<&'a str> {
    if let Some(kind) = config.kind.as_deref() {
        return Some(kind);
    }

    let class = snapshot.device_class();
    let unit = snapshot.unit_of_measurement();

    let kind = match snapshot.entity_id.domain() {
        "binary_sensor" => BINARY_SENSOR,
        "fan" => AIR_PURIFIER,
        "sensor" => match (class, unit) {
            (Some("temperature"), _) => TEMPERATURE_SENSOR,
            (_, Some(TEMP_CELSIUS)) | (_, Some(TEMP_FAHRENHEIT)) => TEMPERATURE_SENSOR,
            (Some("humidity"), _) => HUMIDITY_SENSOR,
            (Some("pm25"), _) | (Some("pm10"), _) => AIR_QUALITY_SENSOR,
            (Some("carbon_monoxide"), _) => CARBON_MONOXIDE_SENSOR,
            (Some("carbon_dioxide"), _) => CARBON_DIOXIDE_SENSOR,
            (Some("illuminance"), _) => LIGHT_SENSOR,
            (_, Some("lx")) | (_, Some("lm")) => LIGHT_SENSOR,
            _ => return None,
        },
        _ => return None,
    };
    Some(kind)
}

/// Select, construct and prime the accessory for a config
pub fn build(aid: u64, config: &AccessoryConfig, ctx: &SyncContext<'_>) -> Result<Accessory> {
    let snapshot = ctx.require(&config.entity_id)?;

    let kind = accessory_kind_for(&snapshot, config)
        .ok_or_else(|| SyncError::Unsupported(config.entity_id.clone()))?;
    let build = constructor(kind).ok_or_else(|| SyncError::UnknownKind(kind.to_string()))?;

    tracing::debug!("Building {} for {} as aid {}", kind, config.entity_id, aid);
    build(aid, config, ctx)
}
