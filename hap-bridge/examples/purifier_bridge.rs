//! Bridge a simulated air purifier and print every published value
//!
//! Run with `HAPSYNC_LOG_MODE=development` to see the engine's logs.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use entity_bus::MemoryBus;
use hap_accessory::logging::init_logging_from_env;
use hap_bridge::{AccessoryConfig, Bridge, BridgeConfig, CharValue, Characteristic, WriteBatch};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let bus = Arc::new(MemoryBus::new());
    bus.set_state(
        "fan.office_purifier",
        "off",
        [("percentage", json!(0)), ("preset_mode", json!("Fan"))],
    );
    bus.set_state("sensor.office_purifier_filter", "64", [("unit_of_measurement", json!("%"))]);

    let config = BridgeConfig::default().with_name("Office").with_accessory(
        AccessoryConfig::new("fan.office_purifier")
            .with_name("Office Purifier")
            .with_filter_life_level("sensor.office_purifier_filter"),
    );
    let bridge = Bridge::builder()
        .with_source_system(Arc::clone(&bus))
        .with_config(config)
        .build()?;
    bus.attach(bridge.hub().clone());

    let printer = {
        let notifications = bridge.notifications();
        thread::spawn(move || {
            for change in notifications.timeout_iter(Duration::from_secs(1)) {
                println!("aid {}: {} = {}", change.aid, change.key, change.value);
            }
        })
    };

    // Remote controller turns the purifier on at 60%
    let batch = WriteBatch::from([
        (Characteristic::Active, CharValue::Int(1)),
        (Characteristic::RotationSpeed, CharValue::Float(60.0)),
    ]);
    for call in bridge.write_characteristics(2, &batch)? {
        println!("issued {}", call);
    }

    // The source system reports the new state back
    bus.set_state(
        "fan.office_purifier",
        "on",
        [("percentage", json!(60)), ("preset_mode", json!("Fan"))],
    );
    bus.set_state("sensor.office_purifier_filter", "63", [("unit_of_measurement", json!("%"))]);

    let _ = printer.join();
    bridge.shutdown();
    Ok(())
}
