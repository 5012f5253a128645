//! Pinch and rotate recognition for touchpads and touchscreens

use super::motion::MotionTriggerHandler;
use super::TriggerManagementResult;
use crate::context::EngineContext;
use crate::input::{InputDevice, TouchPointType};
use crate::trigger::{
    PinchDirection, RotateDirection, TriggerActivationEvent, TriggerType, TriggerUpdateEvent,
    UpdateDirection,
};
use crate::variables::{
    finger_initial_position, finger_position, finger_pressure, Value, FINGERS,
    FINGER_VARIABLE_COUNT, THUMB_INITIAL_POSITION_PERCENTAGE, THUMB_POSITION_PERCENTAGE,
    THUMB_PRESENT,
};
use tracing::debug;

/// Accumulated rotation in degrees that makes a two-finger gesture a rotation
const ROTATE_TYPE_THRESHOLD: f64 = 10.0;

/// Scale change that makes a two-finger gesture a pinch
const PINCH_TYPE_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PinchType {
    #[default]
    Unknown,
    Pinch,
    Rotate,
}

#[derive(Debug)]
pub struct MultiTouchMotionTriggerHandler {
    motion: MotionTriggerHandler,
    previous_scale: f64,
    pinch_type: PinchType,
    accumulated_rotation: f64,
}

impl MultiTouchMotionTriggerHandler {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            motion: MotionTriggerHandler::new(ctx),
            previous_scale: 1.0,
            pinch_type: PinchType::Unknown,
            accumulated_rotation: 0.0,
        }
    }

    pub fn motion(&self) -> &MotionTriggerHandler {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut MotionTriggerHandler {
        &mut self.motion
    }

    pub fn activate_triggers(
        &mut self,
        types: TriggerType,
        event: &TriggerActivationEvent,
    ) -> TriggerManagementResult {
        self.previous_scale = 1.0;
        self.pinch_type = PinchType::Unknown;
        self.accumulated_rotation = 0.0;
        self.motion.activate_triggers(types, event)
    }

    /// `scale` is relative to the start of the gesture, `angle_delta` is in
    /// degrees. Returns whether the event should be blocked.
    pub fn handle_pinch(&mut self, scale: f64, angle_delta: f64) -> bool {
        if !self
            .motion
            .triggers()
            .has_active_triggers(TriggerType::PINCH_ROTATE)
        {
            return false;
        }

        debug!(scale, angle_delta, "pinch event");
        let scale_delta = scale - self.previous_scale;
        self.previous_scale = scale;

        self.accumulated_rotation += angle_delta.abs();
        if self.pinch_type == PinchType::Unknown {
            if self.accumulated_rotation >= ROTATE_TYPE_THRESHOLD {
                debug!("pinch type determined: rotate");
                self.pinch_type = PinchType::Rotate;
                self.motion.cancel_triggers(TriggerType::PINCH);
            } else if (1.0 - scale).abs() >= PINCH_TYPE_THRESHOLD {
                debug!("pinch type determined: pinch");
                self.pinch_type = PinchType::Pinch;
                self.motion.cancel_triggers(TriggerType::ROTATE);
            } else {
                return self.blocking();
            }
        }

        let (trigger_type, delta, direction, pinch) = match self.pinch_type {
            PinchType::Rotate => {
                let direction = if angle_delta > 0.0 {
                    RotateDirection::Clockwise
                } else {
                    RotateDirection::Counterclockwise
                };
                (TriggerType::ROTATE, angle_delta, UpdateDirection::Rotate(direction), None)
            }
            _ => {
                let direction = if scale < 1.0 {
                    PinchDirection::In
                } else {
                    PinchDirection::Out
                };
                (TriggerType::PINCH, scale_delta, UpdateDirection::Pinch(direction), Some(direction))
            }
        };

        let Some(speed) = self.motion.determine_speed(trigger_type, delta, pinch) else {
            debug!("determining pinch speed");
            return self.blocking();
        };

        let event = TriggerUpdateEvent::new(delta)
            .with_direction(direction)
            .with_speed(speed);
        let result = self.motion.triggers_mut().update_triggers_of(trigger_type, event);
        debug!(success = result.success, block = result.block, "pinch processed");
        result.block
    }

    fn blocking(&self) -> bool {
        self.motion
            .triggers()
            .has_blocking_triggers(TriggerType::PINCH_ROTATE)
    }

    /// Publish contact positions, pressures and the finger count of `device`
    pub fn update_variables(&self, device: Option<&InputDevice>) {
        let variables = self.motion.triggers().ctx().variables.clone();
        let points = device
            .map(|device| device.physical_state().valid_touch_points())
            .unwrap_or_default();

        let mut thumb = None;
        for i in 0..FINGER_VARIABLE_COUNT {
            let finger = i + 1;
            let Some(point) = points.get(i) else {
                variables.set(&finger_initial_position(finger), None);
                variables.set(&finger_position(finger), None);
                variables.set(&finger_pressure(finger), None);
                continue;
            };

            if point.kind == TouchPointType::Thumb {
                thumb = Some(*point);
            }
            variables.set(&finger_initial_position(finger), Some(point.initial_position.into()));
            variables.set(&finger_position(finger), Some(point.position.into()));
            variables.set(&finger_pressure(finger), Some(Value::Number(f64::from(point.pressure))));
        }

        match thumb {
            Some(point) => {
                variables.set(THUMB_INITIAL_POSITION_PERCENTAGE, Some(point.initial_position.into()));
                variables.set(THUMB_POSITION_PERCENTAGE, Some(point.position.into()));
                variables.set(THUMB_PRESENT, Some(true.into()));
            }
            None => {
                variables.set(THUMB_INITIAL_POSITION_PERCENTAGE, None);
                variables.set(THUMB_POSITION_PERCENTAGE, None);
                variables.set(THUMB_PRESENT, Some(false.into()));
            }
        }
        variables.set(FINGERS, Some(points.len().into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionContext, On, TriggerAction};
    use crate::context::{InputEmitter, PointerPositionProvider};
    use crate::geometry::Point;
    use crate::input::{InputDeviceType, MouseButton};
    use crate::timer::ManualClock;
    use crate::trigger::Trigger;
    use crate::variables::{MemoryVariableStore, VariableStore};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    #[derive(Default)]
    struct Log(RefCell<Vec<String>>);

    impl InputEmitter for Log {
        fn keyboard_key(&self, _: u16, _: bool) {}
        fn keyboard_text(&self, _: &str) {}
        fn keyboard_clear_modifiers(&self) {}
        fn mouse_button(&self, _: MouseButton, _: bool) {}
        fn mouse_move(&self, _: Point) {}
        fn mouse_wheel(&self, _: Point) {}
        fn touchpad_pinch_begin(&self, _: u8) {}
        fn touchpad_swipe_begin(&self, _: u8) {}
        fn touchscreen_touch_down(&self, _: i32, _: Point) {}
        fn touchscreen_touch_up(&self, _: i32) {}
    }

    impl PointerPositionProvider for Log {
        fn global_pointer_position(&self) -> Option<Point> {
            None
        }
        fn set_global_pointer_position(&self, _: Point) {}
    }

    struct Record(Rc<Log>, &'static str);

    impl Action for Record {
        fn execute(&mut self, _: &ActionContext<'_>) {
            self.0 .0.borrow_mut().push(self.1.to_string());
        }
    }

    fn handler() -> (MultiTouchMotionTriggerHandler, Rc<Log>, Rc<MemoryVariableStore>) {
        let log = Rc::new(Log::default());
        let variables = Rc::new(MemoryVariableStore::new());
        let ctx = EngineContext::new(
            log.clone(),
            log.clone(),
            variables.clone(),
            Rc::new(ManualClock::new()),
        );
        (MultiTouchMotionTriggerHandler::new(ctx), log, variables)
    }

    fn add(handler: &mut MultiTouchMotionTriggerHandler, log: &Rc<Log>, trigger: Trigger, name: &'static str) {
        let trigger = trigger
            .with_id(name)
            .with_action(TriggerAction::new(On::Begin, Record(log.clone(), name)));
        handler.motion_mut().triggers_mut().add_trigger(trigger);
    }

    #[test]
    fn test_scale_change_selects_pinch() {
        let (mut handler, log, _) = handler();
        add(&mut handler, &log, Trigger::pinch(PinchDirection::In), "in");
        add(&mut handler, &log, Trigger::rotate(RotateDirection::Any), "rotate");
        handler.activate_triggers(TriggerType::PINCH_ROTATE, &TriggerActivationEvent::default());

        // undecided events are blocked without updating anything
        assert!(handler.handle_pinch(0.9, 1.0));
        assert!(log.0.borrow().is_empty());
        assert!(handler.handle_pinch(0.75, 1.0));
        assert_eq!(*log.0.borrow(), vec!["in"]);
        assert!(!handler
            .motion()
            .triggers()
            .has_active_triggers(TriggerType::ROTATE));
    }

    #[test]
    fn test_rotation_selects_rotate() {
        let (mut handler, log, _) = handler();
        add(&mut handler, &log, Trigger::pinch(PinchDirection::Any), "pinch");
        add(&mut handler, &log, Trigger::rotate(RotateDirection::Counterclockwise), "ccw");
        handler.activate_triggers(TriggerType::PINCH_ROTATE, &TriggerActivationEvent::default());

        handler.handle_pinch(1.0, -6.0);
        handler.handle_pinch(1.0, -6.0);
        assert_eq!(*log.0.borrow(), vec!["ccw"]);
        assert!(!handler.motion().triggers().has_active_triggers(TriggerType::PINCH));
    }

    #[test]
    fn test_pinch_without_triggers_passes() {
        let (mut handler, _, _) = handler();
        assert!(!handler.handle_pinch(0.5, 0.0));
    }

    #[test]
    fn test_variables_follow_valid_points() {
        let (handler, _, variables) = handler();
        let mut device = InputDevice::new(InputDeviceType::Touchpad, "pad", "event1");
        device.properties.thumb_pressure = Some(100);
        let now = Instant::now();
        device.touch_down(0, Point::new(0.1, 0.2), Point::default(), 10, now);
        device.touch_down(1, Point::new(0.5, 0.5), Point::default(), 150, now);

        handler.update_variables(Some(&device));
        assert_eq!(variables.get(FINGERS), Some(Value::Number(2.0)));
        assert_eq!(variables.get(&finger_position(1)), Some(Point::new(0.1, 0.2).into()));
        assert_eq!(variables.get(&finger_pressure(2)), Some(Value::Number(150.0)));
        assert_eq!(variables.get(THUMB_PRESENT), Some(Value::Bool(true)));
        assert_eq!(variables.get(&finger_position(3)), None);

        handler.update_variables(None);
        assert_eq!(variables.get(FINGERS), Some(Value::Number(0.0)));
        assert_eq!(variables.get(THUMB_PRESENT), Some(Value::Bool(false)));
    }
}
