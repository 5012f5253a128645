//! Touchpad triggers: click, pinch, press, rotate, stroke, swipe and tap
//!
//! Taps with up to three fingers are only reported reliably through the
//! pointer button that libinput emits after the fingers are lifted, while
//! taps with four or more fingers and every motion gesture are recognized
//! from the touch contacts. The two paths meet in
//! [`TouchpadState::LibinputTapBegin`], a short window between the last
//! touch-up and the button event.
//!
//! Each touchpad owns its own handler.

use super::multitouch::MultiTouchMotionTriggerHandler;
use super::{InputEventHandler, TriggerManagementResult};
use crate::context::EngineContext;
use crate::geometry::PointDelta;
use crate::input::{DeviceId, GesturePhase, InputDevice, InputDeviceType, InputEvent, MouseButton};
use crate::timer::{earliest, Timer};
use crate::trigger::{TriggerActivationEvent, TriggerType, TriggerUpdateEvent};
use crate::variables::{Value, FINGERS};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Maximum duration of a touch-path tap
pub const TAP_TIMEOUT: Duration = Duration::from_millis(200);

/// How long to wait for libinput's tap button after the last touch-up
pub const LIBINPUT_TAP_TIMEOUT: Duration = Duration::from_millis(300);

/// Distance from the initial position, in normalized touchpad units, that
/// turns a touch into motion
const TAP_MOTION_THRESHOLD: f64 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchpadState {
    #[default]
    None,
    /// Two-finger scrolling reported as pointer axis events
    Scrolling,
    /// Fingers are down and were held too long for a tap
    TouchIdle,
    /// Fingers are down and moved too far for a tap
    Touch,
    /// Single-finger pointer motion, `triggered` when a trigger activated
    Motion { triggered: bool },
    TapBegin,
    LibinputTapBegin,
    /// The touchpad is physically clicked, `blocked` when a click trigger activated
    TouchpadButtonDown { blocked: bool },
}

#[derive(Debug)]
pub struct TouchpadTriggerHandler {
    device: DeviceId,
    multitouch: MultiTouchMotionTriggerHandler,
    state: TouchpadState,

    tap_timer: Timer,
    libinput_tap_timer: Timer,
    /// Delays press triggers so that a click or tap is not read as a press
    click_timer: Timer,
    delayed_press: TriggerType,
    /// Highest contact count seen since the tap began
    tap_fingers: usize,

    blocked_buttons: Vec<MouseButton>,
    gesture_begin_blocked: bool,
}

impl TouchpadTriggerHandler {
    pub fn new(ctx: EngineContext, device: DeviceId) -> Self {
        Self {
            device,
            multitouch: MultiTouchMotionTriggerHandler::new(ctx),
            state: TouchpadState::None,
            tap_timer: Timer::new(),
            libinput_tap_timer: Timer::new(),
            click_timer: Timer::new(),
            delayed_press: TriggerType::empty(),
            tap_fingers: 0,
            blocked_buttons: Vec::new(),
            gesture_begin_blocked: false,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn state(&self) -> TouchpadState {
        self.state
    }

    pub fn multitouch(&self) -> &MultiTouchMotionTriggerHandler {
        &self.multitouch
    }

    pub fn multitouch_mut(&mut self) -> &mut MultiTouchMotionTriggerHandler {
        &mut self.multitouch
    }

    fn ctx(&self) -> &EngineContext {
        self.multitouch.motion().triggers().ctx()
    }

    fn now(&self) -> Instant {
        self.ctx().clock.now()
    }

    fn set_fingers(&self, fingers: usize) {
        self.ctx().variables.set(FINGERS, Some(Value::from(fingers)));
    }

    fn activate(&mut self, types: TriggerType) -> TriggerManagementResult {
        self.multitouch
            .activate_triggers(types, &TriggerActivationEvent::default())
    }

    fn end(&mut self, types: TriggerType) -> TriggerManagementResult {
        self.multitouch.motion_mut().end_triggers(types)
    }

    fn cancel(&mut self, types: TriggerType) -> TriggerManagementResult {
        self.multitouch.motion_mut().cancel_triggers(types)
    }

    fn set_state(&mut self, state: TouchpadState) {
        if self.state == state {
            return;
        }
        trace!(from = ?self.state, to = ?state, "touchpad state changed");

        match self.state {
            TouchpadState::TapBegin => self.tap_timer.stop(),
            TouchpadState::LibinputTapBegin => self.libinput_tap_timer.stop(),
            _ => {}
        }
        let now = self.now();
        match state {
            TouchpadState::TapBegin => self.tap_timer.start(now, TAP_TIMEOUT),
            TouchpadState::LibinputTapBegin => self.libinput_tap_timer.start(now, LIBINPUT_TAP_TIMEOUT),
            _ => {}
        }
        self.state = state;
    }

    fn touch_down(&mut self, device: &InputDevice) -> bool {
        self.multitouch.update_variables(Some(device));
        let fingers = device.physical_state().valid_touch_points().len();
        match self.state {
            TouchpadState::None | TouchpadState::LibinputTapBegin => {
                self.tap_fingers = fingers;
                self.set_state(TouchpadState::TapBegin);
            }
            TouchpadState::TapBegin => self.tap_fingers = self.tap_fingers.max(fingers),
            _ => {}
        }
        false
    }

    fn touch_changed(&mut self, device: &InputDevice) -> bool {
        if self.state != TouchpadState::TapBegin {
            return false;
        }

        let moved = device
            .physical_state()
            .valid_touch_points()
            .iter()
            .any(|point| (point.position - point.initial_position).hypot() >= TAP_MOTION_THRESHOLD);
        if moved {
            debug!("touchpad contact moved, not a tap");
            self.set_state(TouchpadState::Touch);
        }
        false
    }

    fn touch_up(&mut self, device: &InputDevice) -> bool {
        if !device.physical_state().valid_touch_points().is_empty() {
            return false;
        }

        match self.state {
            TouchpadState::TapBegin if self.tap_fingers >= 4 => {
                self.set_fingers(self.tap_fingers);
                self.tap();
                self.multitouch.update_variables(Some(device));
                self.set_state(TouchpadState::None);
            }
            TouchpadState::TapBegin => self.set_state(TouchpadState::LibinputTapBegin),
            TouchpadState::Motion { .. } | TouchpadState::Scrolling => {
                self.end(TriggerType::STROKE_SWIPE);
                self.set_state(TouchpadState::None);
            }
            TouchpadState::Touch | TouchpadState::TouchIdle => self.set_state(TouchpadState::None),
            _ => {}
        }
        false
    }

    fn touch_cancel(&mut self) -> bool {
        self.cancel(TriggerType::ALL);
        self.set_state(TouchpadState::None);
        false
    }

    /// Activate, update and immediately end tap triggers
    fn tap(&mut self) -> bool {
        if !self.activate(TriggerType::TAP).success {
            return false;
        }
        self.multitouch
            .motion_mut()
            .triggers_mut()
            .update_triggers_of(TriggerType::TAP, TriggerUpdateEvent::new(0.0));
        self.end(TriggerType::TAP);
        true
    }

    /// Two-finger scrolling, treated as motion
    fn pointer_axis(&mut self, delta: PointDelta) -> bool {
        match self.state {
            TouchpadState::Motion { .. }
            | TouchpadState::None
            | TouchpadState::Touch
            | TouchpadState::TouchIdle => {
                self.set_fingers(2);
                self.set_state(TouchpadState::Scrolling);
                self.activate(TriggerType::STROKE_SWIPE);
            }
            TouchpadState::Scrolling => {}
            _ => return false,
        }

        if delta.unaccelerated_hypot() == 0.0 && delta.accelerated_hypot() == 0.0 {
            // blocking the terminating event would break kinetic scrolling
            self.end(TriggerType::STROKE_SWIPE);
            self.set_state(TouchpadState::None);
            return false;
        }
        self.handle_motion(delta)
    }

    fn pointer_button(&mut self, device: &InputDevice, button: MouseButton, pressed: bool) -> bool {
        let mut block = false;
        match self.state {
            TouchpadState::LibinputTapBegin | TouchpadState::TouchIdle
                if pressed && device.physical_state().valid_touch_points().len() <= 3 =>
            {
                let lmr = device.properties.lmr_tap_button_map();
                let fingers = match button {
                    MouseButton::LEFT => Some(1),
                    MouseButton::RIGHT => Some(if lmr { 3 } else { 2 }),
                    MouseButton::MIDDLE => Some(if lmr { 2 } else { 3 }),
                    _ => None,
                };
                if let Some(fingers) = fingers {
                    debug!(%button, fingers, "libinput tap");
                    self.set_fingers(fingers);
                    block = self.tap();
                    self.multitouch.update_variables(Some(device));
                    self.set_state(TouchpadState::None);
                }
            }
            TouchpadState::TouchpadButtonDown { blocked: true } => block = true,
            _ => {}
        }

        if pressed {
            if block {
                self.blocked_buttons.push(button);
            }
            return block;
        }

        let was_blocked = self.blocked_buttons.contains(&button);
        self.blocked_buttons.retain(|b| *b != button);
        was_blocked || block
    }

    /// Single-finger motion
    fn pointer_motion(&mut self, delta: PointDelta) -> bool {
        match self.state {
            TouchpadState::Motion { triggered: true } => {}
            // nothing matched when the motion started
            TouchpadState::Motion { triggered: false } => return false,
            TouchpadState::None
            | TouchpadState::Touch
            | TouchpadState::TouchIdle => {
                self.set_fingers(1);
                let triggered = self.activate(TriggerType::STROKE_SWIPE).success;
                self.set_state(TouchpadState::Motion { triggered });
                if !triggered {
                    return false;
                }
            }
            _ => return false,
        }
        self.handle_motion(delta)
    }

    fn handle_motion(&mut self, delta: PointDelta) -> bool {
        self.multitouch.motion_mut().handle_motion(
            InputDeviceType::Touchpad,
            delta,
            &TriggerActivationEvent::default(),
        )
    }

    fn touchpad_click(&mut self, device: &InputDevice, pressed: bool) -> bool {
        if pressed {
            self.cancel(TriggerType::PRESS);
            let blocked = self.activate(TriggerType::CLICK).success;
            self.set_state(TouchpadState::TouchpadButtonDown { blocked });
        } else if matches!(self.state, TouchpadState::TouchpadButtonDown { .. }) {
            let state = if device.physical_state().valid_touch_points().is_empty() {
                TouchpadState::None
            } else {
                TouchpadState::Touch
            };
            self.set_state(state);
            self.end(TriggerType::CLICK);
        }

        self.click_timer.stop();
        false
    }

    fn gesture(&mut self, device: &InputDevice, phase: GesturePhase, triggers: TriggerType, fingers: u8) -> bool {
        match phase {
            GesturePhase::Begin => {
                self.set_fingers(usize::from(fingers));

                // short hold gestures stop kinetic scrolling and must reach the environment
                self.gesture_begin_blocked = !(triggers.contains(TriggerType::PRESS) && fingers <= 2);

                let event = TriggerActivationEvent::default();
                let has_click_or_tap = self
                    .multitouch
                    .motion()
                    .triggers()
                    .activatable_triggers(TriggerType::CLICK | TriggerType::TAP, &event)
                    .next()
                    .is_some();
                if triggers.contains(TriggerType::PRESS) && has_click_or_tap {
                    let timeout = TAP_TIMEOUT.max(device.properties.touchpad_click_timeout());
                    debug!(?timeout, "delaying press triggers");
                    self.delayed_press = triggers;
                    self.click_timer.start(self.now(), timeout);
                    return self.gesture_begin_blocked;
                }

                self.activate(triggers).block && self.gesture_begin_blocked
            }
            GesturePhase::Cancel => {
                self.click_timer.stop();
                self.cancel(triggers).success && self.gesture_begin_blocked
            }
            GesturePhase::End => {
                self.click_timer.stop();
                // libinput ends hold gestures instead of cancelling them when the touchpad is clicked
                if matches!(self.state, TouchpadState::TouchpadButtonDown { .. })
                    && triggers == TriggerType::PRESS
                {
                    return self.cancel(triggers).success && self.gesture_begin_blocked;
                }
                self.end(triggers).success && self.gesture_begin_blocked
            }
        }
    }

    fn click_timeout(&mut self) {
        let types = self.delayed_press;
        if self
            .multitouch
            .motion()
            .triggers()
            .has_active_triggers(TriggerType::ALL & !types)
        {
            return;
        }
        self.activate(types);
    }
}

impl InputEventHandler for TouchpadTriggerHandler {
    fn handle_event(&mut self, device: &InputDevice, event: &InputEvent) -> bool {
        if let InputEvent::KeyboardKey { pressed, .. } = event {
            self.multitouch.motion_mut().triggers_mut().keyboard_key(*pressed);
            return false;
        }
        if device.id != self.device {
            return false;
        }

        match event {
            InputEvent::PointerAxis { delta, .. } => self.pointer_axis(*delta),
            InputEvent::PointerButton { button, pressed } => self.pointer_button(device, *button, *pressed),
            InputEvent::PointerMotion { delta } => self.pointer_motion(*delta),
            InputEvent::TouchDown { .. } => self.touch_down(device),
            InputEvent::TouchChanged { .. } => self.touch_changed(device),
            InputEvent::TouchUp { .. } => self.touch_up(device),
            InputEvent::TouchCancel => self.touch_cancel(),
            InputEvent::TouchpadClick { pressed } => self.touchpad_click(device, *pressed),
            InputEvent::TouchpadGesture {
                phase,
                triggers,
                fingers,
            } => self.gesture(device, *phase, *triggers, *fingers),
            InputEvent::TouchpadPinch { scale, angle_delta } => {
                self.multitouch.handle_pinch(*scale, *angle_delta)
            }
            InputEvent::TouchpadSwipe { delta } => self.handle_motion(*delta),
            InputEvent::KeyboardKey { .. } => false,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.tap_timer.deadline(),
            self.libinput_tap_timer.deadline(),
            self.click_timer.deadline(),
            self.multitouch.motion().triggers().next_deadline(),
        ])
    }

    fn dispatch_timers(&mut self) {
        let now = self.now();
        if self.tap_timer.poll(now) && self.state == TouchpadState::TapBegin {
            debug!("touchpad tap timed out");
            self.set_state(TouchpadState::TouchIdle);
        }
        if self.libinput_tap_timer.poll(now) && self.state == TouchpadState::LibinputTapBegin {
            debug!("no libinput tap button");
            self.set_state(TouchpadState::None);
        }
        if self.click_timer.poll(now) {
            self.click_timeout();
        }
        self.multitouch.motion_mut().triggers_mut().dispatch_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionContext, On, TriggerAction};
    use crate::condition::{ComparisonOperator, ConditionHandle, VariableCondition};
    use crate::context::{InputEmitter, PointerPositionProvider};
    use crate::geometry::Point;
    use crate::timer::{Clock, ManualClock};
    use crate::trigger::{SwipeDirection, Trigger};
    use crate::variables::{finger_position, MemoryVariableStore, VariableStore};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log(RefCell<Vec<String>>);

    impl Log {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.borrow_mut())
        }
    }

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

    struct Record(Rc<Log>, String);

    impl Action for Record {
        fn execute(&mut self, _: &ActionContext<'_>) {
            self.0 .0.borrow_mut().push(self.1.clone());
        }
    }

    fn recorded(log: &Rc<Log>, trigger: Trigger, name: &str) -> Trigger {
        let mut trigger = trigger.with_id(name);
        for (on, label) in [(On::Begin, "begin"), (On::End, "end"), (On::Cancel, "cancel")] {
            trigger = trigger.with_action(TriggerAction::new(on, Record(log.clone(), format!("{name}:{label}"))));
        }
        trigger
    }

    fn fingers(count: f64) -> ConditionHandle {
        ConditionHandle::new(VariableCondition::new(FINGERS, ComparisonOperator::EqualTo, count))
    }

    struct Fixture {
        handler: TouchpadTriggerHandler,
        touchpad: InputDevice,
        log: Rc<Log>,
        clock: Rc<ManualClock>,
        variables: Rc<MemoryVariableStore>,
        next_id: i32,
    }

    impl Fixture {
        fn new(triggers: impl FnOnce(&Rc<Log>) -> Vec<Trigger>) -> Self {
            let log = Rc::new(Log::default());
            let clock = Rc::new(ManualClock::new());
            let variables = Rc::new(MemoryVariableStore::new());
            let ctx = EngineContext::new(log.clone(), log.clone(), variables.clone(), clock.clone());
            let touchpad = InputDevice::new(InputDeviceType::Touchpad, "touchpad", "event5");
            let mut handler = TouchpadTriggerHandler::new(ctx, touchpad.id);
            for trigger in triggers(&log) {
                handler.multitouch_mut().motion_mut().triggers_mut().add_trigger(trigger);
            }
            Self {
                handler,
                touchpad,
                log,
                clock,
                variables,
                next_id: 0,
            }
        }

        fn event(&mut self, event: InputEvent) -> bool {
            self.handler.handle_event(&self.touchpad, &event)
        }

        fn add_point(&mut self, position: Point) {
            let id = self.next_id;
            self.next_id += 1;
            let now = self.clock.now();
            self.touchpad.touch_down(id, position, position, 0, now);
            self.event(InputEvent::TouchDown { id, position });
        }

        fn add_points(&mut self, count: usize) {
            for i in 0..count {
                self.add_point(Point::new(0.1 * (i + 1) as f64, 0.5));
            }
        }

        fn move_points(&mut self, by: Point) {
            for id in 0..self.next_id {
                let Some(point) = self.touchpad.physical_state().find_touch_point(id) else {
                    continue;
                };
                let position = point.position + by;
                self.touchpad.touch_motion(id, position, position);
                self.event(InputEvent::TouchChanged {
                    id,
                    position_delta: by,
                });
            }
        }

        fn remove_points(&mut self) {
            for id in 0..self.next_id {
                if self.touchpad.touch_up(id) {
                    self.event(InputEvent::TouchUp { id });
                }
            }
        }

        fn button(&mut self, button: MouseButton, pressed: bool) -> bool {
            self.event(InputEvent::PointerButton { button, pressed })
        }

        fn click(&mut self, pressed: bool) -> bool {
            self.event(InputEvent::TouchpadClick { pressed })
        }

        fn gesture(&mut self, phase: GesturePhase, triggers: TriggerType, fingers: u8) -> bool {
            self.event(InputEvent::TouchpadGesture {
                phase,
                triggers,
                fingers,
            })
        }

        fn advance(&mut self, ms: u64) {
            self.clock.advance(Duration::from_millis(ms));
            self.handler.dispatch_timers();
        }
    }

    #[test]
    fn test_click_without_libinput_button() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::CLICK), "click")]);
        f.click(true);
        assert_eq!(f.handler.state(), TouchpadState::TouchpadButtonDown { blocked: true });
        f.advance(5);
        f.click(false);
        assert_eq!(f.log.take(), vec!["click:begin", "click:end"]);
        assert_eq!(f.handler.state(), TouchpadState::None);
    }

    #[test]
    fn test_click_blocks_libinput_button() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::CLICK), "click")]);
        f.click(true);
        assert!(f.button(MouseButton::RIGHT, true));
        f.click(false);
        assert!(f.button(MouseButton::RIGHT, false));
        assert_eq!(f.handler.state(), TouchpadState::None);
    }

    #[test]
    fn test_short_hold_is_not_blocked() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::PRESS), "press")]);
        assert!(!f.gesture(GesturePhase::Begin, TriggerType::PRESS, 1));
        assert!(f.handler.multitouch().motion().triggers().has_active_triggers(TriggerType::PRESS));
        assert!(!f.gesture(GesturePhase::End, TriggerType::PRESS, 1));
    }

    #[test]
    fn test_three_finger_hold_is_blocked() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::PRESS), "press")]);
        assert!(f.gesture(GesturePhase::Begin, TriggerType::PRESS, 3));
        assert!(f.gesture(GesturePhase::End, TriggerType::PRESS, 3));
    }

    #[test]
    fn test_press_delayed_by_click_trigger() {
        let mut f = Fixture::new(|log| {
            vec![
                recorded(log, Trigger::new(TriggerType::PRESS), "press"),
                recorded(log, Trigger::new(TriggerType::CLICK), "click"),
            ]
        });
        f.gesture(GesturePhase::Begin, TriggerType::PRESS, 1);
        f.advance(150);
        assert!(!f.handler.multitouch().motion().triggers().has_active_triggers(TriggerType::ALL));
        f.advance(100);
        assert!(f.handler.multitouch().motion().triggers().has_active_triggers(TriggerType::PRESS));
    }

    #[test]
    fn test_click_during_press_cancels_press() {
        let mut f = Fixture::new(|log| {
            vec![
                recorded(log, Trigger::new(TriggerType::PRESS), "press"),
                recorded(log, Trigger::new(TriggerType::CLICK), "click"),
            ]
        });
        f.gesture(GesturePhase::Begin, TriggerType::PRESS, 1);
        f.advance(250);
        f.click(true);
        f.gesture(GesturePhase::End, TriggerType::PRESS, 1);
        assert!(f.handler.multitouch().motion().triggers().has_active_triggers(TriggerType::CLICK));
        f.click(false);
        assert_eq!(f.handler.state(), TouchpadState::None);
        assert!(!f.log.take().contains(&"press:end".to_string()));
    }

    #[test]
    fn test_one_finger_swipe() {
        let mut f = Fixture::new(|log| {
            vec![recorded(
                log,
                Trigger::swipe(SwipeDirection::Any).with_activation_condition(fingers(1.0)),
                "swipe",
            )]
        });
        f.add_points(1);
        f.move_points(Point::new(0.05, 0.0));
        assert_eq!(f.handler.state(), TouchpadState::Touch);
        assert!(f.event(InputEvent::PointerMotion {
            delta: Point::new(10.0, 0.0).into()
        }));
        assert_eq!(f.handler.state(), TouchpadState::Motion { triggered: true });
        f.remove_points();
        assert_eq!(f.handler.state(), TouchpadState::None);
    }

    #[test]
    fn test_motion_without_trigger_stays_untriggered() {
        let mut f = Fixture::new(|log| {
            vec![recorded(
                log,
                Trigger::swipe(SwipeDirection::Any).with_activation_condition(ConditionHandle::new(
                    VariableCondition::new("gate", ComparisonOperator::EqualTo, 1.0),
                )),
                "swipe",
            )]
        });
        let motion = || InputEvent::PointerMotion {
            delta: Point::new(10.0, 0.0).into(),
        };
        assert!(!f.event(motion()));
        assert_eq!(f.handler.state(), TouchpadState::Motion { triggered: false });

        // the condition turning true mid-motion does not start the swipe
        f.variables.set("gate", Some(1.0.into()));
        assert!(!f.event(motion()));
        assert_eq!(f.handler.state(), TouchpadState::Motion { triggered: false });
        assert!(!f.handler.multitouch().motion().triggers().has_active_triggers(TriggerType::ALL));
        assert!(f.log.take().is_empty());
    }

    #[test]
    fn test_two_finger_scroll_ends_on_null_delta() {
        let mut f = Fixture::new(|log| {
            vec![recorded(
                log,
                Trigger::swipe(SwipeDirection::Any).with_activation_condition(fingers(2.0)),
                "swipe",
            )]
        });
        let axis = |x: f64| InputEvent::PointerAxis {
            delta: Point::new(x, 0.0).into(),
            one_axis_per_event: false,
        };
        assert!(f.event(axis(10.0)));
        assert_eq!(f.handler.state(), TouchpadState::Scrolling);
        assert!(!f.event(axis(0.0)));
        assert_eq!(f.handler.state(), TouchpadState::None);
    }

    #[test]
    fn test_one_finger_tap_waits_for_libinput_button() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::TAP), "tap")]);
        f.add_points(1);
        f.remove_points();
        assert_eq!(f.handler.state(), TouchpadState::LibinputTapBegin);
        assert!(f.log.take().is_empty());

        assert!(f.button(MouseButton::LEFT, true));
        assert_eq!(f.log.take(), vec!["tap:begin", "tap:end"]);
        assert!(f.button(MouseButton::LEFT, false));

        // ordinary clicks pass through
        assert!(!f.button(MouseButton::LEFT, true));
        assert!(!f.button(MouseButton::LEFT, false));
        assert_eq!(f.handler.state(), TouchpadState::None);
    }

    #[test]
    fn test_tap_state_resets_without_libinput_button() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::TAP), "tap")]);
        f.add_points(1);
        f.remove_points();
        assert_eq!(f.handler.state(), TouchpadState::LibinputTapBegin);
        f.advance(299);
        assert_eq!(f.handler.state(), TouchpadState::LibinputTapBegin);
        f.advance(1);
        assert_eq!(f.handler.state(), TouchpadState::None);
        assert!(f.log.take().is_empty());
    }

    #[test]
    fn test_lmr_map_selects_finger_count() {
        let mut f = Fixture::new(|log| {
            vec![recorded(
                log,
                Trigger::new(TriggerType::TAP).with_activation_condition(fingers(2.0)),
                "tap",
            )]
        });
        f.touchpad.properties.lmr_tap_button_map = Some(true);
        f.add_points(2);
        f.remove_points();
        f.button(MouseButton::MIDDLE, true);
        f.button(MouseButton::MIDDLE, false);
        assert_eq!(f.log.take(), vec!["tap:begin", "tap:end"]);
    }

    #[test]
    fn test_tap_variables_survive_until_activation() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::TAP), "tap")]);
        f.add_point(Point::new(0.1, 0.1));
        f.add_point(Point::new(0.2, 0.2));
        f.remove_points();
        assert_eq!(f.variables.get(&finger_position(2)), Some(Point::new(0.2, 0.2).into()));

        f.button(MouseButton::RIGHT, true);
        f.button(MouseButton::RIGHT, false);
        assert_eq!(f.variables.get(&finger_position(1)), None);
    }

    #[test]
    fn test_four_finger_tap() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::TAP), "tap")]);
        f.add_points(4);
        f.remove_points();
        assert_eq!(f.log.take(), vec!["tap:begin", "tap:end"]);
        assert_eq!(f.handler.state(), TouchpadState::None);
    }

    #[test]
    fn test_moved_four_finger_tap_is_ignored() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::TAP), "tap")]);
        f.add_points(4);
        f.move_points(Point::new(0.1, 0.1));
        f.remove_points();
        assert!(f.log.take().is_empty());
        assert_eq!(f.handler.state(), TouchpadState::None);
    }

    #[test]
    fn test_slow_four_finger_tap_is_ignored() {
        let mut f = Fixture::new(|log| vec![recorded(log, Trigger::new(TriggerType::TAP), "tap")]);
        f.add_points(4);
        f.advance(500);
        assert_eq!(f.handler.state(), TouchpadState::TouchIdle);
        f.remove_points();
        assert!(f.log.take().is_empty());
        assert_eq!(f.handler.state(), TouchpadState::None);
    }

    #[test]
    fn test_clicked_four_finger_tap_is_a_click() {
        let mut f = Fixture::new(|log| {
            vec![
                recorded(log, Trigger::new(TriggerType::CLICK), "click"),
                recorded(log, Trigger::new(TriggerType::TAP), "tap"),
            ]
        });
        f.add_points(4);
        f.click(true);
        f.advance(5);
        f.click(false);
        f.remove_points();
        assert_eq!(f.log.take(), vec!["click:begin", "click:end"]);
        assert_eq!(f.handler.state(), TouchpadState::None);
    }
}
