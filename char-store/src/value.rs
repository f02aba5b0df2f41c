//! Characteristic values and their declared formats
//!
//! The target protocol only knows three value shapes for the characteristics
//! this workspace exposes: booleans, integers and floats. A `CharValue`
//! carries one of them; a `ValueFormat` is the shape the protocol declared
//! for a characteristic and is used to coerce whatever a handler publishes.
//!
//! # Example
//!
//! ```rust
//! use char_store::{CharProperties, CharValue, ValueFormat};
//!
//! let props = CharProperties::new(ValueFormat::Int).with_range(0.0, 100.0);
//! assert_eq!(props.to_valid_value(CharValue::Float(150.7)), CharValue::Int(100));
//! assert_eq!(props.to_valid_value(CharValue::Bool(true)), CharValue::Int(1));
//! ```

use std::fmt;

/// A single characteristic value
///
/// Equality is numeric: `Bool(true) == Int(1) == Float(1.0)`. The protocol
/// compares values after coercion, so a stored `Float(0.0)` must equal a
/// freshly read `Int(0)`.
#[derive(Debug, Clone, Copy)]
pub enum CharValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl CharValue {
    /// Numeric view of the value (`true` is 1.0)
    pub fn as_f64(&self) -> f64 {
        match *self {
            CharValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            CharValue::Int(i) => i as f64,
            CharValue::Float(f) => f,
        }
    }

    /// Integer view of the value, truncating floats
    pub fn as_i64(&self) -> i64 {
        match *self {
            CharValue::Bool(b) => i64::from(b),
            CharValue::Int(i) => i,
            CharValue::Float(f) => f as i64,
        }
    }

    /// Truthiness: nonzero numbers and `true`
    pub fn is_truthy(&self) -> bool {
        self.as_f64() != 0.0
    }

    /// Convert into the given format without range checks
    pub fn to_format(self, format: ValueFormat) -> CharValue {
        match format {
            ValueFormat::Bool => CharValue::Bool(self.is_truthy()),
            ValueFormat::Int => CharValue::Int(self.as_i64()),
            ValueFormat::Float => CharValue::Float(self.as_f64()),
        }
    }

    /// The format this value currently has
    pub fn format(&self) -> ValueFormat {
        match self {
            CharValue::Bool(_) => ValueFormat::Bool,
            CharValue::Int(_) => ValueFormat::Int,
            CharValue::Float(_) => ValueFormat::Float,
        }
    }
}

impl PartialEq for CharValue {
    fn eq(&self, other: &Self) -> bool {
        self.as_f64() == other.as_f64()
    }
}

impl fmt::Display for CharValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharValue::Bool(b) => write!(f, "{}", b),
            CharValue::Int(i) => write!(f, "{}", i),
            CharValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for CharValue {
    fn from(value: bool) -> Self {
        CharValue::Bool(value)
    }
}

impl From<i64> for CharValue {
    fn from(value: i64) -> Self {
        CharValue::Int(value)
    }
}

impl From<i32> for CharValue {
    fn from(value: i32) -> Self {
        CharValue::Int(i64::from(value))
    }
}

impl From<u8> for CharValue {
    fn from(value: u8) -> Self {
        CharValue::Int(i64::from(value))
    }
}

impl From<f64> for CharValue {
    fn from(value: f64) -> Self {
        CharValue::Float(value)
    }
}

/// Value format declared by the target protocol for a characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    Bool,
    Int,
    Float,
}

impl ValueFormat {
    /// Neutral initial value for this format
    pub fn neutral(&self) -> CharValue {
        match self {
            ValueFormat::Bool => CharValue::Bool(false),
            ValueFormat::Int => CharValue::Int(0),
            ValueFormat::Float => CharValue::Float(0.0),
        }
    }
}

/// Protocol-declared properties of a characteristic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharProperties {
    pub format: ValueFormat,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_step: Option<f64>,
}

impl CharProperties {
    pub fn new(format: ValueFormat) -> Self {
        Self {
            format,
            min_value: None,
            max_value: None,
            min_step: None,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn with_min_step(mut self, step: f64) -> Self {
        self.min_step = Some(step);
        self
    }

    /// Coerce a published value into the declared format and range
    ///
    /// Booleans are never clamped.
    pub fn to_valid_value(&self, value: CharValue) -> CharValue {
        if self.format == ValueFormat::Bool {
            return value.to_format(ValueFormat::Bool);
        }

        let mut number = value.as_f64();
        if let Some(max) = self.max_value {
            number = number.min(max);
        }
        if let Some(min) = self.min_value {
            number = number.max(min);
        }
        CharValue::Float(number).to_format(self.format)
    }
}
