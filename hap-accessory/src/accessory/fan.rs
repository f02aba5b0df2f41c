//! Shared fan synchronization
//!
//! Power and speed handling common to every fan-like accessory. Composite
//! accessories call these helpers explicitly and layer their own
//! characteristics on top.
//!
//! Forward: `on`/`off` drive `Active`; the `percentage` attribute drives
//! `RotationSpeed`, with the zero-while-on quirk applied.
//!
//! Reverse: `plan_power` and `plan_speed` bracket whatever mode commands a
//! composite inserts, so speed always lands last.

use char_store::CharacteristicMap;
use entity_bus::{EntityId, ServiceCall, StateSnapshot};

use super::{publish, WriteBatch};
use crate::catalog::Characteristic;
use crate::coerce::value_to_float;

pub const DOMAIN: &str = "fan";

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";

pub const ATTR_PERCENTAGE: &str = "percentage";
pub const ATTR_PERCENTAGE_STEP: &str = "percentage_step";
pub const ATTR_PRESET_MODE: &str = "preset_mode";

pub const SERVICE_TURN_ON: &str = "turn_on";
pub const SERVICE_TURN_OFF: &str = "turn_off";
pub const SERVICE_SET_PERCENTAGE: &str = "set_percentage";
pub const SERVICE_SET_PRESET_MODE: &str = "set_preset_mode";

/// Feature bit for setting speed directly
pub const FEATURE_SET_SPEED: u64 = 1;

/// Speed step declared by the entity, `1` when absent or invalid
pub fn percentage_step(snapshot: &StateSnapshot) -> f64 {
    snapshot
        .attribute(ATTR_PERCENTAGE_STEP)
        .and_then(value_to_float)
        .filter(|step| *step > 0.0)
        .unwrap_or(1.0)
}

/// Whether a speed command also powers the fan on
///
/// Entities that do not declare features are assumed to support it.
pub fn supports_set_speed(snapshot: Option<&StateSnapshot>) -> bool {
    snapshot
        .and_then(StateSnapshot::supported_features)
        .map_or(true, |features| features & FEATURE_SET_SPEED != 0)
}

/// `Active` value for a state, `None` when the state is neither on nor off
pub fn active_value(state: &str) -> Option<i64> {
    match state {
        STATE_ON => Some(1),
        STATE_OFF => Some(0),
        _ => None,
    }
}

/// `RotationSpeed` value for a snapshot, `None` to leave it unchanged
///
/// - off: the reported percentage, or 0 when there is none
/// - on: the reported percentage, with 0 raised to `max(1, min_step)` since
///   the protocol reads a zero speed as "off" and would lose the restore value
/// - anything else: the reported percentage if there is one
pub fn speed_value(snapshot: &StateSnapshot, min_step: f64) -> Option<f64> {
    let percentage = snapshot.attribute(ATTR_PERCENTAGE).and_then(value_to_float);

    match snapshot.state.as_str() {
        STATE_OFF => Some(percentage.unwrap_or(0.0)),
        STATE_ON => percentage.map(|p| if p == 0.0 { min_step.max(1.0) } else { p }),
        _ => percentage,
    }
}

/// Forward sync of `Active` and `RotationSpeed`
pub fn sync_power_and_speed(chars: &mut CharacteristicMap<Characteristic>, snapshot: &StateSnapshot) {
    if let Some(active) = active_value(&snapshot.state) {
        publish(chars, Characteristic::Active, active);
    }

    let min_step = chars
        .get(Characteristic::RotationSpeed)
        .and_then(|handle| handle.properties().min_step)
        .unwrap_or(1.0);

    if let Some(speed) = speed_value(snapshot, min_step) {
        publish(chars, Characteristic::RotationSpeed, speed);
    }
}

pub fn turn_on(entity_id: &EntityId) -> ServiceCall {
    ServiceCall::new(DOMAIN, SERVICE_TURN_ON, entity_id.clone())
}

pub fn turn_off(entity_id: &EntityId) -> ServiceCall {
    ServiceCall::new(DOMAIN, SERVICE_TURN_OFF, entity_id.clone())
}

pub fn set_percentage(entity_id: &EntityId, percentage: i64) -> ServiceCall {
    ServiceCall::new(DOMAIN, SERVICE_SET_PERCENTAGE, entity_id.clone())
        .with_data(ATTR_PERCENTAGE, percentage)
}

pub fn set_preset_mode(entity_id: &EntityId, preset: &str) -> ServiceCall {
    ServiceCall::new(DOMAIN, SERVICE_SET_PRESET_MODE, entity_id.clone())
        .with_data(ATTR_PRESET_MODE, preset)
}

/// Outcome of the power part of a write
#[derive(Debug, Clone, PartialEq)]
pub enum PowerPlan {
    /// Power off and issue nothing else from this batch
    Off(ServiceCall),
    /// Continue with the rest of the batch, powering on first if set
    Continue(Option<ServiceCall>),
}

/// Power handling for a batch
///
/// A power-on is left out when the batch also sets a speed and the fan
/// supports setting speed, so the fan does not jump to a default speed
/// before the requested one lands.
pub fn plan_power(entity_id: &EntityId, batch: &WriteBatch, speed_capable: bool) -> PowerPlan {
    match batch.get(&Characteristic::Active) {
        Some(active) if !active.is_truthy() => PowerPlan::Off(turn_off(entity_id)),
        Some(_) => {
            let speed_requested = batch.contains_key(&Characteristic::RotationSpeed);
            if speed_requested && speed_capable {
                PowerPlan::Continue(None)
            } else {
                PowerPlan::Continue(Some(turn_on(entity_id)))
            }
        }
        None => PowerPlan::Continue(None),
    }
}

/// Speed command for a batch; issue it after every power and mode command
pub fn plan_speed(entity_id: &EntityId, batch: &WriteBatch) -> Option<ServiceCall> {
    batch
        .get(&Characteristic::RotationSpeed)
        .map(|speed| set_percentage(entity_id, speed.as_f64().round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use char_store::{CharProperties, CharValue, ValueFormat};
    use rstest::rstest;
    use serde_json::json;

    fn fan(state: &str) -> StateSnapshot {
        StateSnapshot::new("fan.purifier", state)
    }

    #[rstest]
    #[case(fan("on").with_attribute(ATTR_PERCENTAGE, 40), 1.0, Some(40.0))]
    #[case(fan("on").with_attribute(ATTR_PERCENTAGE, 0), 1.0, Some(1.0))]
    #[case(fan("on").with_attribute(ATTR_PERCENTAGE, 0), 33.3, Some(33.3))]
    #[case(fan("on").with_attribute(ATTR_PERCENTAGE, 0), 0.5, Some(1.0))]
    #[case(fan("on"), 1.0, None)]
    #[case(fan("off"), 1.0, Some(0.0))]
    #[case(fan("off").with_attribute(ATTR_PERCENTAGE, 60), 1.0, Some(60.0))]
    #[case(fan("off").with_attribute(ATTR_PERCENTAGE, "bogus"), 1.0, Some(0.0))]
    #[case(fan("unavailable"), 1.0, None)]
    fn test_speed_value(
        #[case] snapshot: StateSnapshot,
        #[case] min_step: f64,
        #[case] expected: Option<f64>,
    ) {
        assert_eq!(speed_value(&snapshot, min_step), expected);
    }

    #[test]
    fn test_percentage_step() {
        assert_eq!(percentage_step(&fan("on")), 1.0);
        assert_eq!(percentage_step(&fan("on").with_attribute(ATTR_PERCENTAGE_STEP, 25)), 25.0);
        assert_eq!(percentage_step(&fan("on").with_attribute(ATTR_PERCENTAGE_STEP, 0)), 1.0);
    }

    #[test]
    fn test_supports_set_speed() {
        assert!(supports_set_speed(None));
        assert!(supports_set_speed(Some(&fan("on"))));
        assert!(supports_set_speed(Some(&fan("on").with_attribute("supported_features", 9))));
        assert!(!supports_set_speed(Some(&fan("on").with_attribute("supported_features", 8))));
    }

    #[test]
    fn test_plan_power() {
        let entity = EntityId::from("fan.purifier");
        let off = WriteBatch::from([
            (Characteristic::Active, CharValue::Int(0)),
            (Characteristic::RotationSpeed, CharValue::Float(80.0)),
        ]);
        assert_eq!(plan_power(&entity, &off, true), PowerPlan::Off(turn_off(&entity)));

        let on_with_speed = WriteBatch::from([
            (Characteristic::Active, CharValue::Int(1)),
            (Characteristic::RotationSpeed, CharValue::Float(80.0)),
        ]);
        assert_eq!(plan_power(&entity, &on_with_speed, true), PowerPlan::Continue(None));
        assert_eq!(
            plan_power(&entity, &on_with_speed, false),
            PowerPlan::Continue(Some(turn_on(&entity)))
        );

        let on_only = WriteBatch::from([(Characteristic::Active, CharValue::Int(1))]);
        assert_eq!(plan_power(&entity, &on_only, true), PowerPlan::Continue(Some(turn_on(&entity))));
    }

    #[test]
    fn test_plan_speed_rounds_percentage() {
        let entity = EntityId::from("fan.purifier");
        let batch = WriteBatch::from([(Characteristic::RotationSpeed, CharValue::Float(39.6))]);
        let call = plan_speed(&entity, &batch).unwrap();
        assert_eq!(call.data.get(ATTR_PERCENTAGE), Some(&json!(40)));
    }

    #[test]
    fn test_sync_power_and_speed_uses_declared_step() {
        let mut chars = CharacteristicMap::new(1);
        chars.configure(Characteristic::Active, CharValue::Int(0), Characteristic::Active.properties());
        chars.configure(
            Characteristic::RotationSpeed,
            CharValue::Float(100.0),
            CharProperties::new(ValueFormat::Float)
                .with_range(0.0, 100.0)
                .with_min_step(20.0),
        );

        sync_power_and_speed(&mut chars, &fan("on").with_attribute(ATTR_PERCENTAGE, 0));
        assert_eq!(chars.value(Characteristic::Active), Some(CharValue::Int(1)));
        assert_eq!(chars.value(Characteristic::RotationSpeed), Some(CharValue::Float(20.0)));
    }
}
