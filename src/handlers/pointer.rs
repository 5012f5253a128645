//! Hover triggers

use super::{InputEventHandler, TriggerHandler};
use crate::context::EngineContext;
use crate::input::{InputDevice, InputEvent};
use crate::trigger::{TriggerActivationEvent, TriggerType};
use std::time::Instant;
use tracing::debug;

/// Activates hover triggers on pointer motion and ends them once their
/// activation condition stops holding. Motion is never blocked.
#[derive(Debug)]
pub struct PointerTriggerHandler {
    triggers: TriggerHandler,
}

impl PointerTriggerHandler {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            triggers: TriggerHandler::new(ctx),
        }
    }

    pub fn triggers(&self) -> &TriggerHandler {
        &self.triggers
    }

    pub fn triggers_mut(&mut self) -> &mut TriggerHandler {
        &mut self.triggers
    }

    fn pointer_motion(&mut self) {
        self.end_unsatisfied();
        if !self.triggers.has_active_triggers(TriggerType::HOVER) {
            self.triggers
                .activate_triggers(TriggerType::HOVER, &TriggerActivationEvent::default());
        }
    }

    fn end_unsatisfied(&mut self) {
        let variables = self.triggers.ctx().variables.clone();
        for index in self.triggers.active_indices(TriggerType::HOVER) {
            let satisfied = self
                .triggers
                .trigger(index)
                .and_then(|trigger| trigger.activation_condition.as_ref())
                .map_or(true, |condition| condition.satisfied(variables.as_ref()));
            if !satisfied {
                debug!(index, "hover condition no longer satisfied");
                self.triggers.end_trigger(index);
            }
        }
    }
}

impl InputEventHandler for PointerTriggerHandler {
    fn handle_event(&mut self, _device: &InputDevice, event: &InputEvent) -> bool {
        match event {
            InputEvent::KeyboardKey { pressed, .. } => self.triggers.keyboard_key(*pressed),
            InputEvent::PointerMotion { .. } => self.pointer_motion(),
            _ => {}
        }
        false
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.triggers.next_deadline()
    }

    fn dispatch_timers(&mut self) {
        self.end_unsatisfied();
        self.triggers.dispatch_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionContext, On, TriggerAction};
    use crate::condition::{ComparisonOperator, ConditionHandle, VariableCondition};
    use crate::context::{InputEmitter, PointerPositionProvider};
    use crate::geometry::Point;
    use crate::input::{InputDeviceType, MouseButton};
    use crate::timer::ManualClock;
    use crate::trigger::Trigger;
    use crate::variables::{MemoryVariableStore, VariableStore};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    struct Nothing;

    impl InputEmitter for Nothing {
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

    impl PointerPositionProvider for Nothing {
        fn global_pointer_position(&self) -> Option<Point> {
            None
        }
        fn set_global_pointer_position(&self, _: Point) {}
    }

    struct Count(Rc<Cell<u32>>);

    impl Action for Count {
        fn execute(&mut self, _: &ActionContext<'_>) {
            self.0.set(self.0.get() + 1);
        }
    }

    struct Fixture {
        handler: PointerTriggerHandler,
        variables: Rc<MemoryVariableStore>,
        clock: Rc<ManualClock>,
        mouse: InputDevice,
        ended: Rc<Cell<u32>>,
    }

    fn fixture() -> Fixture {
        let nothing = Rc::new(Nothing);
        let variables = Rc::new(MemoryVariableStore::new());
        let clock = Rc::new(ManualClock::new());
        let ctx = EngineContext::new(nothing.clone(), nothing, variables.clone(), clock.clone());
        let ended = Rc::new(Cell::new(0));
        let mut handler = PointerTriggerHandler::new(ctx);
        handler.triggers_mut().add_trigger(
            Trigger::new(TriggerType::HOVER)
                .with_activation_condition(ConditionHandle::new(VariableCondition::new(
                    "window_class",
                    ComparisonOperator::EqualTo,
                    "panel",
                )))
                .with_action(TriggerAction::new(On::End, Count(ended.clone()))),
        );
        Fixture {
            handler,
            variables,
            clock,
            mouse: InputDevice::new(InputDeviceType::Mouse, "mouse", "event2"),
            ended,
        }
    }

    fn motion(f: &mut Fixture) -> bool {
        let event = InputEvent::PointerMotion {
            delta: Point::new(1.0, 0.0).into(),
        };
        f.handler.handle_event(&f.mouse, &event)
    }

    #[test]
    fn test_condition_gates_activation() {
        let mut f = fixture();
        assert!(!motion(&mut f));
        assert!(!f.handler.triggers().has_active_triggers(TriggerType::HOVER));

        f.variables.set("window_class", Some("panel".into()));
        assert!(!motion(&mut f));
        assert!(f.handler.triggers().has_active_triggers(TriggerType::HOVER));
    }

    #[test]
    fn test_ends_without_motion_when_condition_fails() {
        let mut f = fixture();
        f.variables.set("window_class", Some("panel".into()));
        motion(&mut f);
        f.clock.advance(Duration::from_millis(5));
        f.handler.dispatch_timers();
        assert_eq!(f.ended.get(), 0);

        f.variables.set("window_class", Some("editor".into()));
        f.clock.advance(Duration::from_millis(5));
        f.handler.dispatch_timers();
        assert_eq!(f.ended.get(), 1);
        assert!(!f.handler.triggers().has_active_triggers(TriggerType::HOVER));
    }
}
