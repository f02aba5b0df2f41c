//! Protocol catalog: services, characteristics and categories
//!
//! The identifiers are opaque to the engine. What matters here is each
//! characteristic's declared format, its range, and whether the remote
//! controller may write it.

use std::fmt;
use std::str::FromStr;

use char_store::{CharProperties, ValueFormat};
use serde::{Deserialize, Serialize};

/// Characteristics exposed by the accessories in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Characteristic {
    CurrentTemperature,
    CurrentRelativeHumidity,
    CurrentAmbientLightLevel,

    CarbonMonoxideLevel,
    CarbonMonoxidePeakLevel,
    CarbonMonoxideDetected,
    CarbonDioxideLevel,
    CarbonDioxidePeakLevel,
    CarbonDioxideDetected,

    ContactSensorState,
    LeakDetected,
    MotionDetected,
    OccupancyDetected,
    SmokeDetected,

    AirQuality,
    #[serde(rename = "PM2.5Density")]
    Pm25Density,
    #[serde(rename = "PM10Density")]
    Pm10Density,

    Active,
    CurrentAirPurifierState,
    TargetAirPurifierState,
    RotationSpeed,
    LockPhysicalControls,
    FilterLifeLevel,
}

impl Characteristic {
    pub const ALL: [Characteristic; 23] = [
        Characteristic::CurrentTemperature,
        Characteristic::CurrentRelativeHumidity,
        Characteristic::CurrentAmbientLightLevel,
        Characteristic::CarbonMonoxideLevel,
        Characteristic::CarbonMonoxidePeakLevel,
        Characteristic::CarbonMonoxideDetected,
        Characteristic::CarbonDioxideLevel,
        Characteristic::CarbonDioxidePeakLevel,
        Characteristic::CarbonDioxideDetected,
        Characteristic::ContactSensorState,
        Characteristic::LeakDetected,
        Characteristic::MotionDetected,
        Characteristic::OccupancyDetected,
        Characteristic::SmokeDetected,
        Characteristic::AirQuality,
        Characteristic::Pm25Density,
        Characteristic::Pm10Density,
        Characteristic::Active,
        Characteristic::CurrentAirPurifierState,
        Characteristic::TargetAirPurifierState,
        Characteristic::RotationSpeed,
        Characteristic::LockPhysicalControls,
        Characteristic::FilterLifeLevel,
    ];

    /// Protocol name
    pub fn hap_name(&self) -> &'static str {
        match self {
            Characteristic::CurrentTemperature => "CurrentTemperature",
            Characteristic::CurrentRelativeHumidity => "CurrentRelativeHumidity",
            Characteristic::CurrentAmbientLightLevel => "CurrentAmbientLightLevel",
            Characteristic::CarbonMonoxideLevel => "CarbonMonoxideLevel",
            Characteristic::CarbonMonoxidePeakLevel => "CarbonMonoxidePeakLevel",
            Characteristic::CarbonMonoxideDetected => "CarbonMonoxideDetected",
            Characteristic::CarbonDioxideLevel => "CarbonDioxideLevel",
            Characteristic::CarbonDioxidePeakLevel => "CarbonDioxidePeakLevel",
            Characteristic::CarbonDioxideDetected => "CarbonDioxideDetected",
            Characteristic::ContactSensorState => "ContactSensorState",
            Characteristic::LeakDetected => "LeakDetected",
            Characteristic::MotionDetected => "MotionDetected",
            Characteristic::OccupancyDetected => "OccupancyDetected",
            Characteristic::SmokeDetected => "SmokeDetected",
            Characteristic::AirQuality => "AirQuality",
            Characteristic::Pm25Density => "PM2.5Density",
            Characteristic::Pm10Density => "PM10Density",
            Characteristic::Active => "Active",
            Characteristic::CurrentAirPurifierState => "CurrentAirPurifierState",
            Characteristic::TargetAirPurifierState => "TargetAirPurifierState",
            Characteristic::RotationSpeed => "RotationSpeed",
            Characteristic::LockPhysicalControls => "LockPhysicalControls",
            Characteristic::FilterLifeLevel => "FilterLifeLevel",
        }
    }

    /// Declared format and range
    pub fn properties(&self) -> CharProperties {
        use Characteristic::*;

        match self {
            CurrentTemperature => CharProperties::new(ValueFormat::Float)
                .with_range(-270.0, 100.0)
                .with_min_step(0.1),
            CurrentRelativeHumidity | RotationSpeed | FilterLifeLevel => {
                CharProperties::new(ValueFormat::Float)
                    .with_range(0.0, 100.0)
                    .with_min_step(1.0)
            }
            CurrentAmbientLightLevel => {
                CharProperties::new(ValueFormat::Float).with_range(0.0001, 100_000.0)
            }
            CarbonMonoxideLevel | CarbonMonoxidePeakLevel => {
                CharProperties::new(ValueFormat::Float).with_range(0.0, 100.0)
            }
            CarbonDioxideLevel | CarbonDioxidePeakLevel => {
                CharProperties::new(ValueFormat::Float).with_range(0.0, 100_000.0)
            }
            Pm25Density | Pm10Density => CharProperties::new(ValueFormat::Float)
                .with_range(0.0, 1000.0)
                .with_min_step(1.0),
            MotionDetected => CharProperties::new(ValueFormat::Bool),
            CarbonMonoxideDetected
            | CarbonDioxideDetected
            | ContactSensorState
            | LeakDetected
            | OccupancyDetected
            | SmokeDetected
            | Active
            | TargetAirPurifierState
            | LockPhysicalControls => CharProperties::new(ValueFormat::Int).with_range(0.0, 1.0),
            CurrentAirPurifierState => CharProperties::new(ValueFormat::Int).with_range(0.0, 2.0),
            AirQuality => CharProperties::new(ValueFormat::Int).with_range(0.0, 5.0),
        }
    }

    pub fn format(&self) -> ValueFormat {
        self.properties().format
    }

    /// Whether the remote controller may write this characteristic
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            Characteristic::Active
                | Characteristic::TargetAirPurifierState
                | Characteristic::RotationSpeed
                | Characteristic::LockPhysicalControls
        )
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hap_name())
    }
}

impl FromStr for Characteristic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Characteristic::ALL
            .iter()
            .copied()
            .find(|c| c.hap_name() == s)
            .ok_or_else(|| format!("unknown characteristic '{}'", s))
    }
}

/// Services exposed by the accessories in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    TemperatureSensor,
    HumiditySensor,
    LightSensor,
    CarbonMonoxideSensor,
    CarbonDioxideSensor,
    ContactSensor,
    LeakSensor,
    MotionSensor,
    OccupancySensor,
    SmokeSensor,
    AirQualitySensor,
    AirPurifier,
}

impl Service {
    pub fn hap_name(&self) -> &'static str {
        match self {
            Service::TemperatureSensor => "TemperatureSensor",
            Service::HumiditySensor => "HumiditySensor",
            Service::LightSensor => "LightSensor",
            Service::CarbonMonoxideSensor => "CarbonMonoxideSensor",
            Service::CarbonDioxideSensor => "CarbonDioxideSensor",
            Service::ContactSensor => "ContactSensor",
            Service::LeakSensor => "LeakSensor",
            Service::MotionSensor => "MotionSensor",
            Service::OccupancySensor => "OccupancySensor",
            Service::SmokeSensor => "SmokeSensor",
            Service::AirQualitySensor => "AirQualitySensor",
            Service::AirPurifier => "AirPurifier",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hap_name())
    }
}

/// Accessory category advertised to the remote controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Sensor,
    AirPurifier,
}

impl Category {
    /// Protocol category code
    pub fn code(&self) -> u8 {
        match self {
            Category::Sensor => 10,
            Category::AirPurifier => 19,
        }
    }
}

/// Service type plus its ordered characteristic list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDeclaration {
    pub service: Service,
    pub characteristics: Vec<Characteristic>,
}

impl ServiceDeclaration {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            characteristics: Vec::new(),
        }
    }

    /// Append a characteristic; duplicates are ignored
    pub fn with(mut self, characteristic: Characteristic) -> Self {
        if !self.characteristics.contains(&characteristic) {
            self.characteristics.push(characteristic);
        }
        self
    }

    pub fn contains(&self, characteristic: Characteristic) -> bool {
        self.characteristics.contains(&characteristic)
    }
}
