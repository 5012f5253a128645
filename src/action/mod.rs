//! Actions and their binding to a trigger's lifecycle
//!
//! An [`Action`] is an externally supplied side effect. A [`TriggerAction`]
//! wraps one and decides at which point of the trigger's lifecycle it runs,
//! how often it repeats during updates, and whether it may run at all.

mod input;

pub use self::input::{InputAction, InputStep};

use crate::condition::ConditionHandle;
use crate::context::InputEmitter;
use crate::geometry::{PointDelta, Range};
use crate::variables::VariableStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Collaborators available while an action executes
pub struct ActionContext<'a> {
    pub emitter: &'a dyn InputEmitter,
    pub variables: &'a dyn VariableStore,
    /// Latest motion delta, multiplied by the handler's delta multiplier
    pub delta_multiplied: PointDelta,
}

/// A side effect executed by a trigger
pub trait Action {
    fn execute(&mut self, ctx: &ActionContext<'_>);

    /// Actions that write input make their trigger clear keyboard
    /// modifiers on start unless configured otherwise
    fn emits_input(&self) -> bool {
        false
    }
}

/// The point of the trigger's lifecycle at which the action executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum On {
    Begin,
    Update,
    Tick,
    #[default]
    End,
    Cancel,
    EndCancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalDirection {
    /// The update delta can be either positive or negative
    #[default]
    Any,
    Positive,
    Negative,
}

/// How often an update action repeats
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionInterval {
    /// Absolute value. 0 executes exactly once per matching update.
    pub value: f64,
    pub direction: IntervalDirection,
}

impl ActionInterval {
    pub fn new(value: f64, direction: IntervalDirection) -> Self {
        Self {
            value: value.abs(),
            direction,
        }
    }

    /// Whether a delta has the direction this interval accepts
    pub fn matches(&self, delta: f64) -> bool {
        match self.direction {
            IntervalDirection::Any => true,
            IntervalDirection::Positive => delta > 0.0,
            IntervalDirection::Negative => delta < 0.0,
        }
    }
}

/// An action bound to a trigger lifecycle point
pub struct TriggerAction {
    action: Box<dyn Action>,
    pub name: String,
    pub on: On,
    pub interval: ActionInterval,
    /// Range of absolute accumulated delta in which the action may execute
    pub threshold: Option<Range>,
    /// Must be satisfied for the action to execute
    pub condition: Option<ConditionHandle>,
    /// Maximum executions per gesture, 0 = no limit
    pub execution_limit: u32,

    executions: u32,
    executed: bool,
    accumulated_delta: f64,
    absolute_accumulated_delta: f64,
}

impl TriggerAction {
    pub fn new(on: On, action: impl Action + 'static) -> Self {
        Self {
            action: Box::new(action),
            name: String::new(),
            on,
            interval: ActionInterval::default(),
            threshold: None,
            condition: None,
            execution_limit: 0,
            executions: 0,
            executed: false,
            accumulated_delta: 0.0,
            absolute_accumulated_delta: 0.0,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_interval(mut self, interval: ActionInterval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_threshold(mut self, threshold: Range) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_condition(mut self, condition: ConditionHandle) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_execution_limit(mut self, limit: u32) -> Self {
        self.execution_limit = limit;
        self
    }

    pub fn emits_input(&self) -> bool {
        self.action.emits_input()
    }

    /// Whether the action executed during the current gesture
    pub fn executed(&self) -> bool {
        self.executed
    }

    pub fn can_execute(&self, variables: &dyn VariableStore) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.satisfied(variables))
            && (self.execution_limit == 0 || self.executions < self.execution_limit)
            && self
                .threshold
                .map_or(true, |threshold| threshold.contains(self.absolute_accumulated_delta))
    }

    pub(crate) fn trigger_started(&mut self, ctx: &ActionContext<'_>) {
        self.executed = false;
        self.executions = 0;
        self.reset();
        if self.on == On::Begin {
            self.try_execute(ctx);
        }
    }

    pub(crate) fn trigger_updated(&mut self, delta: f64, ctx: &ActionContext<'_>) {
        if delta == 0.0 {
            return;
        }

        if self.accumulated_delta != 0.0
            && self.accumulated_delta.is_sign_negative() != delta.is_sign_negative()
        {
            debug!(name = %self.name, "gesture direction changed");
            self.accumulated_delta = delta;
        } else {
            self.accumulated_delta += delta;
        }
        self.absolute_accumulated_delta += delta.abs();

        if self.on != On::Update {
            return;
        }

        let interval = self.interval.value;
        if interval == 0.0 {
            if self.interval.matches(delta) {
                self.try_execute(ctx);
            }
            return;
        }

        // Execute once per whole interval of accumulated delta
        while self.interval.matches(self.accumulated_delta)
            && (self.accumulated_delta / interval).abs() >= 1.0
        {
            self.try_execute(ctx);
            if self.accumulated_delta > 0.0 {
                self.accumulated_delta -= interval;
            } else {
                self.accumulated_delta += interval;
            }
        }
    }

    pub(crate) fn trigger_ticked(&mut self, ctx: &ActionContext<'_>) {
        if self.on == On::Tick {
            self.try_execute(ctx);
        }
    }

    pub(crate) fn trigger_ended(&mut self, ctx: &ActionContext<'_>) {
        if matches!(self.on, On::End | On::EndCancel) {
            self.try_execute(ctx);
        }
        self.executed = false;
        self.reset();
    }

    pub(crate) fn trigger_cancelled(&mut self, ctx: &ActionContext<'_>) {
        if matches!(self.on, On::Cancel | On::EndCancel) {
            self.try_execute(ctx);
        }
        self.executed = false;
        self.reset();
    }

    fn try_execute(&mut self, ctx: &ActionContext<'_>) {
        if !self.can_execute(ctx.variables) {
            return;
        }

        debug!(name = %self.name, on = ?self.on, "executing action");
        self.executions += 1;
        self.action.execute(ctx);
        self.executed = true;
    }

    fn reset(&mut self) {
        self.accumulated_delta = 0.0;
        self.absolute_accumulated_delta = 0.0;
    }
}

impl std::fmt::Debug for TriggerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerAction")
            .field("name", &self.name)
            .field("on", &self.on)
            .field("interval", &self.interval)
            .field("executions", &self.executions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::input::keys::MouseButton;
    use crate::variables::MemoryVariableStore;
    use std::cell::Cell;
    use std::rc::Rc;

    struct NullEmitter;

    impl InputEmitter for NullEmitter {
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

    struct Counter(Rc<Cell<u32>>);

    impl Action for Counter {
        fn execute(&mut self, _: &ActionContext<'_>) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn counting(on: On) -> (TriggerAction, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        (TriggerAction::new(on, Counter(count.clone())), count)
    }

    fn with_ctx(f: impl FnOnce(&ActionContext<'_>)) {
        let variables = MemoryVariableStore::new();
        let ctx = ActionContext {
            emitter: &NullEmitter,
            variables: &variables,
            delta_multiplied: PointDelta::default(),
        };
        f(&ctx);
    }

    #[test]
    fn test_update_interval_repeats_per_whole_interval() {
        let (action, count) = counting(On::Update);
        let mut action = action.with_interval(ActionInterval::new(10.0, IntervalDirection::Any));
        with_ctx(|ctx| {
            action.trigger_started(ctx);
            action.trigger_updated(25.0, ctx);
            assert_eq!(count.get(), 2);
            action.trigger_updated(5.0, ctx);
            assert_eq!(count.get(), 3);
        });
    }

    #[test]
    fn test_direction_change_resets_accumulator() {
        let (action, count) = counting(On::Update);
        let mut action = action.with_interval(ActionInterval::new(10.0, IntervalDirection::Any));
        with_ctx(|ctx| {
            action.trigger_started(ctx);
            action.trigger_updated(8.0, ctx);
            action.trigger_updated(-8.0, ctx);
            assert_eq!(count.get(), 0);
            action.trigger_updated(-3.0, ctx);
            assert_eq!(count.get(), 1);
        });
    }

    #[test]
    fn test_zero_interval_respects_direction() {
        let (action, count) = counting(On::Update);
        let mut action = action.with_interval(ActionInterval::new(0.0, IntervalDirection::Negative));
        with_ctx(|ctx| {
            action.trigger_started(ctx);
            action.trigger_updated(1.0, ctx);
            action.trigger_updated(-1.0, ctx);
            action.trigger_updated(0.0, ctx);
            assert_eq!(count.get(), 1);
        });
    }

    #[test]
    fn test_execution_limit() {
        let (action, count) = counting(On::Update);
        let mut action = action.with_execution_limit(2);
        with_ctx(|ctx| {
            action.trigger_started(ctx);
            for _ in 0..5 {
                action.trigger_updated(1.0, ctx);
            }
            assert_eq!(count.get(), 2);
            assert!(!action.can_execute(ctx.variables));

            // a new gesture resets the limit
            action.trigger_ended(ctx);
            action.trigger_started(ctx);
            assert!(action.can_execute(ctx.variables));
        });
    }

    #[test]
    fn test_threshold_gates_end_action() {
        let (action, count) = counting(On::End);
        let mut action = action.with_threshold(Range::at_least(10.0));
        with_ctx(|ctx| {
            action.trigger_started(ctx);
            action.trigger_updated(5.0, ctx);
            action.trigger_ended(ctx);
            assert_eq!(count.get(), 0);

            action.trigger_started(ctx);
            action.trigger_updated(12.0, ctx);
            action.trigger_ended(ctx);
            assert_eq!(count.get(), 1);
        });
    }

    #[test]
    fn test_end_cancel_fires_on_both() {
        let (mut action, count) = counting(On::EndCancel);
        with_ctx(|ctx| {
            action.trigger_started(ctx);
            action.trigger_cancelled(ctx);
            action.trigger_started(ctx);
            action.trigger_ended(ctx);
        });
        assert_eq!(count.get(), 2);
    }
}
