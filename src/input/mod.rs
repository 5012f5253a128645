//! Input devices, events and key codes
//!
//! This module holds the data the recognition pipeline works on: devices
//! with their physical and virtual state, the closed set of raw events, and
//! evdev key and button codes.

pub mod device;
pub mod event;
pub mod keys;

pub use self::device::{
    DeviceId, DeviceRuleCondition, InputDevice, InputDeviceProperties, InputDeviceRule,
    InputDeviceState, InputDeviceType, TouchPoint, TouchPointType, MAX_TOUCH_POINTS,
};
pub use self::event::{GesturePhase, InputEvent};
pub use self::keys::{KeyboardModifiers, KeySet, MouseButton};
