//! Mouse press, swipe, stroke and wheel triggers
//!
//! A button press starts two chained single-shot timers. The press timeout
//! gives the user time to press every button of a chord, the motion timeout
//! that follows is the window in which motion turns the gesture into a swipe
//! or stroke. If neither happens, press triggers are activated.
//!
//! Buttons that some trigger could use are blocked at press time. When no
//! trigger ends up using them they are replayed through the emitter so that
//! the environment still sees an ordinary click.

use super::motion::MotionTriggerHandler;
use super::{InputEventHandler, TriggerManagementResult};
use crate::context::EngineContext;
use crate::geometry::{Point, PointDelta};
use crate::input::keys::modifier_for_key;
use crate::input::{InputDevice, InputDeviceType, InputEvent, KeyboardModifiers, MouseButton};
use crate::timer::{earliest, Timer};
use crate::trigger::{
    TriggerActivationEvent, TriggerKind, TriggerType, TriggerUpdateEvent, UpdateDirection,
    WheelDirection,
};
use std::time::{Duration, Instant};
use tracing::debug;

/// Unaccelerated distance the pointer must travel before motion counts as a gesture
const MOTION_THRESHOLD: f64 = 5.0;

#[derive(Debug)]
pub struct MouseTriggerHandler {
    motion: MotionTriggerHandler,
    press_timeout: Duration,
    motion_timeout: Duration,
    unblock_buttons_on_timeout: bool,

    press_timer: Timer,
    motion_timer: Timer,
    /// Activation context captured at the last press
    activation: TriggerActivationEvent,
    instant_press: bool,
    motion_since_press: f64,
    had_trigger_since_press: bool,
    blocked_buttons: Vec<MouseButton>,
    /// Held buttons in press order
    buttons: Vec<MouseButton>,
    modifiers: KeyboardModifiers,
}

impl MouseTriggerHandler {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            motion: MotionTriggerHandler::new(ctx),
            press_timeout: Duration::from_millis(50),
            motion_timeout: Duration::from_millis(200),
            unblock_buttons_on_timeout: true,
            press_timer: Timer::new(),
            motion_timer: Timer::new(),
            activation: TriggerActivationEvent::default(),
            instant_press: false,
            motion_since_press: 0.0,
            had_trigger_since_press: false,
            blocked_buttons: Vec::new(),
            buttons: Vec::new(),
            modifiers: KeyboardModifiers::empty(),
        }
    }

    pub fn motion(&self) -> &MotionTriggerHandler {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut MotionTriggerHandler {
        &mut self.motion
    }

    fn now(&self) -> Instant {
        self.motion.triggers().ctx().clock.now()
    }

    fn activation_event(&self) -> TriggerActivationEvent {
        TriggerActivationEvent {
            mouse_buttons: Some(self.buttons.clone()),
            ..Default::default()
        }
    }

    fn activate(&mut self, types: TriggerType, event: &TriggerActivationEvent) -> TriggerManagementResult {
        let result = self.motion.activate_triggers(types, event);
        if result.success {
            self.had_trigger_since_press = true;
        }
        result
    }

    fn keyboard_key(&mut self, key: u16, pressed: bool) -> bool {
        if !pressed {
            self.motion.end_triggers(TriggerType::ALL);
        }
        if let Some(modifier) = modifier_for_key(key) {
            self.modifiers.set(modifier, pressed);
        }
        // a modifier released before the button would otherwise leave the flag set
        if self.blocked_buttons.is_empty() {
            self.had_trigger_since_press = false;
        }
        false
    }

    fn pointer_button(&mut self, device: &InputDevice, button: MouseButton, pressed: bool) -> bool {
        debug!(%button, pressed, "mouse button");
        self.motion.end_triggers(TriggerType::WHEEL);

        if pressed {
            self.press_timeout = device.properties.mouse_press_timeout();
            self.motion_timeout = device.properties.mouse_motion_timeout();
            self.unblock_buttons_on_timeout = device.properties.mouse_unblock_buttons_on_timeout();

            self.motion_since_press = 0.0;
            self.had_trigger_since_press = false;
            if !self.buttons.contains(&button) {
                self.buttons.push(button);
            }

            self.motion.cancel_triggers(TriggerType::ALL);
            self.activation = self.activation_event();
            self.instant_press = self
                .motion
                .triggers()
                .activatable_triggers(TriggerType::PRESS, &self.activation)
                .any(|trigger| trigger.instant);
            if self.instant_press {
                debug!("press trigger is instant");
            }

            let now = self.now();
            self.motion_timer.stop();
            self.press_timer.start(now, self.press_timeout);
            debug!("waiting for all mouse buttons");

            if self.should_block_mouse_button(button) {
                self.blocked_buttons.push(button);
                return true;
            }
            return false;
        }

        self.buttons.retain(|b| *b != button);
        self.motion.end_triggers(TriggerType::ALL);

        // released before the timeouts elapsed, keep rapid clicks from skipping the gesture
        if self.press_timer.is_active() || self.motion_timer.is_active() {
            self.press_timer.stop();
            self.motion_timer.stop();

            if self.instant_press {
                let activation = self.activation.clone();
                self.activate(TriggerType::PRESS, &activation);
                self.motion.triggers_mut().tick();
                self.motion.end_triggers(TriggerType::PRESS);
            }
        }

        let block = self.blocked_buttons.contains(&button);
        let blocked = self.blocked_buttons.len();
        self.blocked_buttons.retain(|b| *b != button);
        if blocked != self.blocked_buttons.len() && !self.had_trigger_since_press {
            debug!(%button, "replaying mouse click");
            let emitter = &self.motion.triggers().ctx().emitter;
            emitter.mouse_button(button, true);
            emitter.mouse_button(button, false);
        }
        if self.blocked_buttons.is_empty() {
            self.had_trigger_since_press = false;
        }
        block
    }

    fn pointer_motion(&mut self, delta: PointDelta) -> bool {
        if self.press_timer.is_active() {
            return true;
        }

        self.motion_since_press += delta.unaccelerated_hypot();
        if self.motion_since_press < MOTION_THRESHOLD {
            return true;
        }

        // motion replaces an active press trigger but nothing else
        let triggers = self.motion.triggers();
        if (!self.had_trigger_since_press || triggers.has_active_triggers(TriggerType::PRESS))
            && !triggers.has_active_triggers(TriggerType::ALL.difference(TriggerType::PRESS))
        {
            self.motion.cancel_triggers(TriggerType::ALL);
            self.motion_timer.stop();

            let activation = self.activation_event();
            if !self.activate(TriggerType::STROKE_SWIPE, &activation).success {
                self.press_blocked_mouse_buttons();
            }
        }

        let had_active = self
            .motion
            .triggers()
            .has_active_triggers(TriggerType::STROKE_SWIPE);
        let activation = self.activation_event();
        let block = self
            .motion
            .handle_motion(InputDeviceType::Mouse, delta, &activation);
        if had_active
            && !self
                .motion
                .triggers()
                .has_active_triggers(TriggerType::STROKE_SWIPE)
        {
            debug!("motion trigger cancelled during motion");
            self.press_blocked_mouse_buttons();
        }
        block
    }

    fn pointer_axis(&mut self, delta: Point) -> bool {
        if !self.motion.triggers().has_active_triggers(TriggerType::WHEEL) {
            let activation = self.activation_event();
            if !self.activate(TriggerType::WHEEL, &activation).success {
                return false;
            }
        }

        let direction = if delta.x > 0.0 {
            WheelDirection::Right
        } else if delta.y > 0.0 {
            WheelDirection::Down
        } else if delta.y < 0.0 {
            WheelDirection::Up
        } else {
            WheelDirection::Left
        };
        let value = if delta.x != 0.0 { delta.x } else { delta.y };
        let event = TriggerUpdateEvent::new(value).with_direction(UpdateDirection::Wheel(direction));
        let result = self
            .motion
            .triggers_mut()
            .update_triggers_of(TriggerType::WHEEL, event);

        let continuous = self
            .motion
            .triggers()
            .active_triggers(TriggerType::WHEEL)
            .any(|trigger| matches!(trigger.kind(), TriggerKind::Wheel { continuous: true, .. }));
        if !continuous || (self.buttons.is_empty() && self.modifiers.is_empty()) {
            self.motion.end_triggers(TriggerType::WHEEL);
        }
        debug!(?direction, success = result.success, "wheel processed");
        result.success
    }

    /// Whether some trigger could use the button, given the buttons pressed so far
    fn should_block_mouse_button(&self, button: MouseButton) -> bool {
        // only a partial match is possible while buttons are still being pressed
        let event = TriggerActivationEvent::default();
        let found = self
            .motion
            .triggers()
            .activatable_triggers(TriggerType::ALL, &event)
            .find(|trigger| {
                if trigger.mouse_buttons_exact_order {
                    trigger.mouse_buttons.starts_with(&self.buttons)
                } else {
                    trigger.mouse_buttons.contains(&button)
                }
            });
        if let Some(trigger) = found {
            debug!(%button, trigger = %trigger.id, "mouse button blocked");
        }
        found.is_some()
    }

    fn press_blocked_mouse_buttons(&mut self) {
        let emitter = self.motion.triggers().ctx().emitter.clone();
        for button in self.blocked_buttons.drain(..) {
            debug!(%button, "mouse button unblocked");
            emitter.mouse_button(button, true);
        }
    }

    /// The motion timeout elapsed, or the press timeout did for an instant press
    fn swipe_timeout(&mut self) {
        if self.had_trigger_since_press {
            debug!("mouse gesture updated before motion timeout");
            return;
        }

        let activation = self.activation.clone();
        if !self.activate(TriggerType::PRESS, &activation).success {
            debug!("no press triggers");
            if self.unblock_buttons_on_timeout {
                self.press_blocked_mouse_buttons();
            }
        }
    }
}

impl InputEventHandler for MouseTriggerHandler {
    fn handle_event(&mut self, device: &InputDevice, event: &InputEvent) -> bool {
        if let InputEvent::KeyboardKey { key, pressed } = event {
            return self.keyboard_key(*key, *pressed);
        }
        if device.device_type != InputDeviceType::Mouse {
            return false;
        }

        match event {
            InputEvent::PointerButton { button, pressed } => self.pointer_button(device, *button, *pressed),
            InputEvent::PointerMotion { delta } => self.pointer_motion(*delta),
            InputEvent::PointerAxis { delta, .. } => self.pointer_axis(delta.accelerated),
            _ => false,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.press_timer.deadline(),
            self.motion_timer.deadline(),
            self.motion.triggers().next_deadline(),
        ])
    }

    fn dispatch_timers(&mut self) {
        let now = self.now();
        if self.press_timer.poll(now) {
            if self.instant_press {
                self.swipe_timeout();
            } else {
                debug!("waiting for mouse motion");
                self.motion_timer.start(now, self.motion_timeout);
            }
        }
        if self.motion_timer.poll(now) {
            debug!("no mouse motion");
            self.swipe_timeout();
        }
        self.motion.triggers_mut().dispatch_timers();
    }
}
