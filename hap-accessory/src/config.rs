//! Accessory and bridge configuration
//!
//! Parsed from JSON. Every optional field has a documented default, and
//! `validate()` rejects combinations the engine cannot honour.

use std::collections::HashSet;
use std::path::Path;

use entity_bus::EntityId;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Preset name meaning "manual" control
pub const DEFAULT_MANUAL_PRESET: &str = "Fan";

/// Preset name selected for automatic control
pub const DEFAULT_AUTO_PRESET: &str = "Auto";

/// The bridge itself occupies aid 1
pub const BRIDGE_AID: u64 = 1;

fn default_manual_preset() -> String {
    DEFAULT_MANUAL_PRESET.to_string()
}

fn default_auto_preset() -> String {
    DEFAULT_AUTO_PRESET.to_string()
}

fn default_first_aid() -> u64 {
    BRIDGE_AID + 1
}

fn default_bridge_name() -> String {
    "HapSync Bridge".to_string()
}

/// Configuration for one accessory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryConfig {
    /// Primary entity
    pub entity_id: EntityId,

    /// Display name
    /// Default: the entity's object id
    #[serde(default)]
    pub name: Option<String>,

    /// Accessory kind name, overriding taxonomy-based selection
    #[serde(default)]
    pub kind: Option<String>,

    /// Second particulate sensor merged into an air quality accessory
    #[serde(default)]
    pub linked_density_sensor: Option<EntityId>,

    /// Switch entity backing a purifier's physical lock
    #[serde(default)]
    pub lock_physical_controls: Option<EntityId>,

    /// Sensor reporting a purifier's remaining filter life
    #[serde(default)]
    pub filter_life_level: Option<EntityId>,

    /// Sensor reporting a purifier's motor rpm
    #[serde(default)]
    pub motor_speed: Option<EntityId>,

    /// Preset reported while a purifier is in manual mode
    /// Default: "Fan"
    #[serde(default = "default_manual_preset")]
    pub manual_preset: String,

    /// Preset requested when automatic mode is selected
    /// Default: "Auto"
    #[serde(default = "default_auto_preset")]
    pub auto_preset: String,
}

impl AccessoryConfig {
    pub fn new(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: None,
            kind: None,
            linked_density_sensor: None,
            lock_physical_controls: None,
            filter_life_level: None,
            motor_speed: None,
            manual_preset: default_manual_preset(),
            auto_preset: default_auto_preset(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_density_sensor(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.linked_density_sensor = Some(entity_id.into());
        self
    }

    pub fn with_lock_physical_controls(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.lock_physical_controls = Some(entity_id.into());
        self
    }

    pub fn with_filter_life_level(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.filter_life_level = Some(entity_id.into());
        self
    }

    pub fn with_motor_speed(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.motor_speed = Some(entity_id.into());
        self
    }

    pub fn with_presets(mut self, manual: impl Into<String>, auto: impl Into<String>) -> Self {
        self.manual_preset = manual.into();
        self.auto_preset = auto.into();
        self
    }

    /// Configured name, or the entity's object id
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => match self.entity_id.object_id() {
                "" => self.entity_id.to_string(),
                object_id => object_id.to_string(),
            },
        }
    }

    /// Linked entities in configuration order
    pub fn linked_entities(&self) -> Vec<&EntityId> {
        [
            self.linked_density_sensor.as_ref(),
            self.lock_physical_controls.as_ref(),
            self.filter_life_level.as_ref(),
            self.motor_speed.as_ref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.entity_id.as_str().is_empty() {
            return Err(SyncError::Config("entity_id must not be empty".to_string()));
        }

        if self.manual_preset.is_empty() || self.auto_preset.is_empty() {
            return Err(SyncError::Config(format!(
                "{}: preset names must not be empty",
                self.entity_id
            )));
        }

        if self.manual_preset == self.auto_preset {
            return Err(SyncError::Config(format!(
                "{}: manual and auto presets are both '{}'",
                self.entity_id, self.manual_preset
            )));
        }

        if self.linked_entities().contains(&&self.entity_id) {
            return Err(SyncError::Config(format!(
                "{}: an accessory cannot link its own entity",
                self.entity_id
            )));
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for a bridge and its accessories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge display name
    /// Default: "HapSync Bridge"
    #[serde(default = "default_bridge_name")]
    pub name: String,

    /// Accessory id given to the first accessory; later ones count up
    /// Default: 2
    #[serde(default = "default_first_aid")]
    pub first_aid: u64,

    #[serde(default)]
    pub accessories: Vec<AccessoryConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: default_bridge_name(),
            first_aid: default_first_aid(),
            accessories: Vec::new(),
        }
    }
}

impl BridgeConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_first_aid(mut self, aid: u64) -> Self {
        self.first_aid = aid;
        self
    }

    pub fn with_accessory(mut self, accessory: AccessoryConfig) -> Self {
        self.accessories.push(accessory);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_aid <= BRIDGE_AID {
            return Err(SyncError::Config(format!(
                "first_aid must be greater than {}",
                BRIDGE_AID
            )));
        }

        let mut seen = HashSet::new();
        for accessory in &self.accessories {
            accessory.validate()?;
            if !seen.insert(&accessory.entity_id) {
                return Err(SyncError::Config(format!(
                    "{} is configured more than once",
                    accessory.entity_id
                )));
            }
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_accessory_defaults() {
        let config = AccessoryConfig::from_json_str(r#"{"entity_id": "fan.bedroom_purifier"}"#).unwrap();
        assert_eq!(config.manual_preset, "Fan");
        assert_eq!(config.auto_preset, "Auto");
        assert_eq!(config.display_name(), "bedroom_purifier");
        assert!(config.linked_entities().is_empty());
    }

    #[test]
    fn test_linked_entities_in_order() {
        let config = AccessoryConfig::new("fan.purifier")
            .with_motor_speed("sensor.purifier_rpm")
            .with_lock_physical_controls("switch.purifier_lock");
        let linked: Vec<&str> = config.linked_entities().iter().map(|e| e.as_str()).collect();
        assert_eq!(linked, vec!["switch.purifier_lock", "sensor.purifier_rpm"]);
    }

    #[test]
    fn test_validate_rejects_equal_presets() {
        let config = AccessoryConfig::new("fan.purifier").with_presets("Auto", "Auto");
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_self_link() {
        let config = AccessoryConfig::new("sensor.pm25").with_density_sensor("sensor.pm25");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bridge_validate_rejects_duplicates_and_low_aid() {
        let duplicated = BridgeConfig::default()
            .with_accessory(AccessoryConfig::new("sensor.a"))
            .with_accessory(AccessoryConfig::new("sensor.a"));
        assert!(duplicated.validate().is_err());

        let low_aid = BridgeConfig::default().with_first_aid(1);
        assert!(low_aid.validate().is_err());

        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bridge_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "name": "Living Room",
                "accessories": [
                    {{"entity_id": "sensor.pm25", "linked_density_sensor": "sensor.pm10"}},
                    {{"entity_id": "fan.purifier", "kind": "AirPurifier", "manual_preset": "Manual"}}
                ]
            }}"#
        )
        .unwrap();

        let config = BridgeConfig::from_path(file.path()).unwrap();
        assert_eq!(config.name, "Living Room");
        assert_eq!(config.first_aid, 2);
        assert_eq!(config.accessories.len(), 2);
        assert_eq!(config.accessories[1].manual_preset, "Manual");
        assert_eq!(config.accessories[1].auto_preset, "Auto");
    }

    #[test]
    fn test_bridge_from_path_missing_file() {
        assert!(matches!(
            BridgeConfig::from_path("/nonexistent/hapsync.json"),
            Err(SyncError::Io(_))
        ));
    }
}
