//! Binary sensor dispatch table
//!
//! Maps a binary sensor's declared class to the service it is exposed as,
//! the detection characteristic, and how a detected flag is formatted.
//! Unknown and absent classes fall back to occupancy.

use char_store::{CharValue, ValueFormat};

use crate::catalog::{Characteristic, Service};

/// Formatter applied to a detected flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionFormat {
    /// `0` / `1`
    Integer,
    /// `false` / `true`
    Boolean,
}

impl DetectionFormat {
    pub fn format(&self, detected: bool) -> CharValue {
        match self {
            DetectionFormat::Integer => CharValue::Int(i64::from(detected)),
            DetectionFormat::Boolean => CharValue::Bool(detected),
        }
    }

    pub fn value_format(&self) -> ValueFormat {
        match self {
            DetectionFormat::Integer => ValueFormat::Int,
            DetectionFormat::Boolean => ValueFormat::Bool,
        }
    }

    /// Value before any state has been observed
    pub fn initial(&self) -> CharValue {
        self.format(false)
    }
}

/// Service, detection characteristic and formatter for one class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceInfo {
    pub service: Service,
    pub characteristic: Characteristic,
    pub format: DetectionFormat,
}

impl ServiceInfo {
    const fn new(service: Service, characteristic: Characteristic, format: DetectionFormat) -> Self {
        Self {
            service,
            characteristic,
            format,
        }
    }
}

const CARBON_MONOXIDE: ServiceInfo = ServiceInfo::new(
    Service::CarbonMonoxideSensor,
    Characteristic::CarbonMonoxideDetected,
    DetectionFormat::Integer,
);
const CARBON_DIOXIDE: ServiceInfo = ServiceInfo::new(
    Service::CarbonDioxideSensor,
    Characteristic::CarbonDioxideDetected,
    DetectionFormat::Integer,
);
const CONTACT: ServiceInfo = ServiceInfo::new(
    Service::ContactSensor,
    Characteristic::ContactSensorState,
    DetectionFormat::Integer,
);
const LEAK: ServiceInfo = ServiceInfo::new(
    Service::LeakSensor,
    Characteristic::LeakDetected,
    DetectionFormat::Integer,
);
const MOTION: ServiceInfo = ServiceInfo::new(
    Service::MotionSensor,
    Characteristic::MotionDetected,
    DetectionFormat::Boolean,
);
const OCCUPANCY: ServiceInfo = ServiceInfo::new(
    Service::OccupancySensor,
    Characteristic::OccupancyDetected,
    DetectionFormat::Integer,
);
const SMOKE: ServiceInfo = ServiceInfo::new(
    Service::SmokeSensor,
    Characteristic::SmokeDetected,
    DetectionFormat::Integer,
);

/// Declared classes with an explicit mapping
pub const MAPPED_CLASSES: [&str; 11] = [
    "carbon_monoxide",
    "gas",
    "carbon_dioxide",
    "door",
    "garage_door",
    "opening",
    "window",
    "moisture",
    "motion",
    "occupancy",
    "smoke",
];

/// Look up the mapping for a declared class
pub fn lookup(device_class: Option<&str>) -> ServiceInfo {
    match device_class {
        Some("carbon_monoxide") | Some("gas") => CARBON_MONOXIDE,
        Some("carbon_dioxide") => CARBON_DIOXIDE,
        Some("door") | Some("garage_door") | Some("opening") | Some("window") => CONTACT,
        Some("moisture") => LEAK,
        Some("motion") => MOTION,
        Some("smoke") => SMOKE,
        Some("occupancy") => OCCUPANCY,
        Some(other) => {
            tracing::debug!("No binary sensor mapping for class '{}', using occupancy", other);
            OCCUPANCY
        }
        None => OCCUPANCY,
    }
}
