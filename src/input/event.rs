//! Raw input events as seen by the handlers

use crate::geometry::{Point, PointDelta};
use crate::input::keys::MouseButton;
use crate::trigger::TriggerType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    Begin,
    Cancel,
    End,
}

/// A raw input event. The originating device is passed alongside.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyboardKey {
        key: u16,
        pressed: bool,
    },
    PointerAxis {
        delta: PointDelta,
        /// The source reports each axis in a separate event
        one_axis_per_event: bool,
    },
    PointerButton {
        button: MouseButton,
        pressed: bool,
    },
    PointerMotion {
        delta: PointDelta,
    },
    TouchDown {
        id: i32,
        position: Point,
    },
    /// Position or pressure of a contact changed
    TouchChanged {
        id: i32,
        position_delta: Point,
    },
    TouchUp {
        id: i32,
    },
    TouchCancel,
    TouchpadClick {
        pressed: bool,
    },
    TouchpadGesture {
        phase: GesturePhase,
        triggers: TriggerType,
        fingers: u8,
    },
    TouchpadPinch {
        scale: f64,
        angle_delta: f64,
    },
    TouchpadSwipe {
        delta: PointDelta,
    },
}

impl InputEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            InputEvent::KeyboardKey { .. } => "keyboard_key",
            InputEvent::PointerAxis { .. } => "pointer_axis",
            InputEvent::PointerButton { .. } => "pointer_button",
            InputEvent::PointerMotion { .. } => "pointer_motion",
            InputEvent::TouchDown { .. } => "touch_down",
            InputEvent::TouchChanged { .. } => "touch_changed",
            InputEvent::TouchUp { .. } => "touch_up",
            InputEvent::TouchCancel => "touch_cancel",
            InputEvent::TouchpadClick { .. } => "touchpad_click",
            InputEvent::TouchpadGesture { .. } => "touchpad_gesture",
            InputEvent::TouchpadPinch { .. } => "touchpad_pinch",
            InputEvent::TouchpadSwipe { .. } => "touchpad_swipe",
        }
    }
}
