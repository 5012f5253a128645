//! Variables published by the engine
//!
//! The engine writes a small set of values (finger count, device name, the
//! id of the last trigger, contact positions) into an external store, where
//! conditions read them back.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Number of `finger_N_*` variables kept up to date
pub const FINGER_VARIABLE_COUNT: usize = 5;

pub const FINGERS: &str = "fingers";
pub const DEVICE_NAME: &str = "device_name";
pub const LAST_TRIGGER_ID: &str = "last_trigger_id";
pub const KEYBOARD_MODIFIERS: &str = "keyboard_modifiers";
pub const POINTER_POSITION: &str = "pointer_position";
pub const THUMB_PRESENT: &str = "thumb_present";
pub const THUMB_POSITION_PERCENTAGE: &str = "thumb_position_percentage";
pub const THUMB_INITIAL_POSITION_PERCENTAGE: &str = "thumb_initial_position_percentage";

pub fn finger_position(finger: usize) -> String {
    format!("finger_{finger}_position_percentage")
}

pub fn finger_initial_position(finger: usize) -> String {
    format!("finger_{finger}_initial_position_percentage")
}

pub fn finger_pressure(finger: usize) -> String {
    format!("finger_{finger}_pressure")
}

/// A variable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Point(Point),
    String(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Point(p) => write!(f, "{},{}", p.x, p.y),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<Point> for Value {
    fn from(value: Point) -> Self {
        Value::Point(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

/// External variable store. Setting `None` unsets the variable.
pub trait VariableStore {
    fn get(&self, name: &str) -> Option<Value>;
    fn set(&self, name: &str, value: Option<Value>);
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryVariableStore {
    values: RefCell<HashMap<String, Value>>,
}

impl MemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every set variable
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values.borrow().clone()
    }
}

impl VariableStore for MemoryVariableStore {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    fn set(&self, name: &str, value: Option<Value>) {
        let mut values = self.values.borrow_mut();
        match value {
            Some(value) => {
                values.insert(name.to_string(), value);
            }
            None => {
                values.remove(name);
            }
        }
    }
}
