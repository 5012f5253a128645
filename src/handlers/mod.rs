//! Trigger handlers
//!
//! One handler per device class turns raw events into trigger transitions
//! and decides whether each event is blocked. They all share the
//! [`TriggerHandler`] core, which owns the configured triggers, the ordered
//! set of active ones and the tick timer driving time-based triggers.

pub mod keyboard;
pub mod motion;
pub mod mouse;
pub mod multitouch;
pub mod pointer;
pub mod touchpad;
pub mod touchscreen;

pub use self::keyboard::KeyboardTriggerHandler;
pub use self::motion::{MotionTriggerHandler, SpeedThreshold};
pub use self::mouse::MouseTriggerHandler;
pub use self::multitouch::MultiTouchMotionTriggerHandler;
pub use self::pointer::PointerTriggerHandler;
pub use self::touchpad::{TouchpadState, TouchpadTriggerHandler};
pub use self::touchscreen::{TouchscreenState, TouchscreenTriggerHandler};

use crate::context::EngineContext;
use crate::input::{InputDevice, InputEvent};
use crate::timer::{earliest, Timer};
use crate::trigger::{Trigger, TriggerActivationEvent, TriggerType, TriggerUpdateEvent};
use std::time::{Duration, Instant};
use tracing::debug;

/// Interval of the tick driving time-based triggers
pub const TICK_INTERVAL: Duration = Duration::from_millis(5);

/// Delta passed to time-based triggers on every tick
pub const TICK_DELTA: f64 = 5.0;

/// Outcome of activating, updating, ending or cancelling triggers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerManagementResult {
    /// At least one trigger was affected
    pub success: bool,
    /// At least one affected trigger blocks events
    pub block: bool,
}

impl TriggerManagementResult {
    fn add(&mut self, trigger: &Trigger) {
        self.success = true;
        self.block |= trigger.block_events;
    }
}

/// A device-class specific event consumer
pub trait InputEventHandler {
    /// Returns whether the event is blocked
    fn handle_event(&mut self, device: &InputDevice, event: &InputEvent) -> bool;

    fn next_deadline(&self) -> Option<Instant>;

    /// Fire every timer whose deadline has passed
    fn dispatch_timers(&mut self);
}

/// Trigger pool and activation bookkeeping shared by every handler
pub struct TriggerHandler {
    ctx: EngineContext,
    triggers: Vec<Trigger>,
    /// Indices into `triggers`, in activation order
    active: Vec<usize>,
    conflicts_resolved: bool,
    tick_timer: Timer,
}

impl TriggerHandler {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            triggers: Vec::new(),
            active: Vec::new(),
            conflicts_resolved: false,
            tick_timer: Timer::new(),
        }
    }

    pub fn ctx(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn add_trigger(&mut self, trigger: Trigger) {
        debug!(id = %trigger.id, kind = ?trigger.trigger_type(), "trigger added");
        self.triggers.push(trigger);
    }

    /// Replace every trigger. Active ones are cancelled first.
    pub fn set_triggers(&mut self, triggers: Vec<Trigger>) {
        self.cancel_triggers(TriggerType::ALL);
        self.tick_timer.stop();
        debug!(count = triggers.len(), "triggers replaced");
        self.triggers = triggers;
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Configured triggers of the given types that could activate now
    pub fn activatable_triggers<'a>(
        &'a self,
        types: TriggerType,
        event: &'a TriggerActivationEvent,
    ) -> impl Iterator<Item = &'a Trigger> + 'a {
        self.triggers.iter().filter(move |trigger| {
            types.intersects(trigger.trigger_type())
                && trigger.can_activate(event, self.ctx.variables.as_ref())
        })
    }

    pub fn has_triggers(&self, types: TriggerType) -> bool {
        self.triggers
            .iter()
            .any(|trigger| types.intersects(trigger.trigger_type()))
    }

    pub fn active_triggers(&self, types: TriggerType) -> impl Iterator<Item = &Trigger> + '_ {
        self.active
            .iter()
            .map(|index| &self.triggers[*index])
            .filter(move |trigger| types.intersects(trigger.trigger_type()))
    }

    pub fn has_active_triggers(&self, types: TriggerType) -> bool {
        self.active_triggers(types).next().is_some()
    }

    /// Whether any active trigger of the given types blocks events
    pub fn has_blocking_triggers(&self, types: TriggerType) -> bool {
        self.active_triggers(types).any(|trigger| trigger.block_events)
    }

    /// Cancel everything that is active, then activate every trigger of the
    /// given types that can activate in this context
    pub fn activate_triggers(
        &mut self,
        types: TriggerType,
        event: &TriggerActivationEvent,
    ) -> TriggerManagementResult {
        debug!(?types, "activating triggers");
        self.cancel_triggers(TriggerType::ALL);
        self.conflicts_resolved = false;

        let variables = self.ctx.variables.clone();
        let eligible: Vec<usize> = (0..self.triggers.len())
            .filter(|index| {
                let trigger = &self.triggers[*index];
                types.intersects(trigger.trigger_type())
                    && trigger.can_activate(event, variables.as_ref())
            })
            .collect();

        for (index, trigger) in self.triggers.iter_mut().enumerate() {
            if trigger.is_suspended() && !eligible.contains(&index) {
                trigger.end(&self.ctx, false);
            }
        }

        let mut result = TriggerManagementResult::default();
        for index in eligible {
            let trigger = &mut self.triggers[index];
            if trigger.is_suspended() {
                trigger.resume();
            }
            debug!(id = %trigger.id, "trigger activated");
            result.add(trigger);
            self.active.push(index);
        }

        if !self.active.is_empty() {
            self.tick_timer
                .start_repeating(self.ctx.clock.now(), TICK_INTERVAL);
        }
        debug!(count = self.active.len(), block = result.block, "triggers activated");
        result
    }

    /// Update active triggers. Each trigger receives the first event whose
    /// type set contains its type; triggers without one are left alone.
    pub fn update_triggers(&mut self, events: &[(TriggerType, TriggerUpdateEvent)]) -> TriggerManagementResult {
        let types = events
            .iter()
            .fold(TriggerType::empty(), |acc, (types, _)| acc | *types);
        let mut result = TriggerManagementResult::default();

        let mut i = 0;
        while i < self.active.len() {
            let index = self.active[i];
            let trigger = &mut self.triggers[index];
            let Some((_, event)) = events
                .iter()
                .find(|(types, _)| types.intersects(trigger.trigger_type()))
            else {
                i += 1;
                continue;
            };

            if !trigger.can_update(event) {
                if trigger.end_if_cannot_update() {
                    trigger.end(&self.ctx, true);
                } else {
                    trigger.cancel(&self.ctx);
                }
                self.active.remove(i);
                continue;
            }

            result.add(trigger);
            trigger.update(event, &self.ctx);

            if self.active.len() > 1 && !self.conflicts_resolved {
                if self.triggers[index].overrides_other_triggers_on_update(self.ctx.variables.as_ref()) {
                    debug!(id = %self.triggers[index].id, "cancelling conflicting triggers");
                    self.conflicts_resolved = true;
                    self.cancel_triggers_except(index);
                    break;
                } else if types.contains(TriggerType::STROKE)
                    && self.has_active_triggers(TriggerType::SWIPE)
                {
                    self.cancel_triggers(TriggerType::SWIPE);
                    break;
                }
            }
            i += 1;
        }
        result
    }

    pub fn update_triggers_of(&mut self, types: TriggerType, event: TriggerUpdateEvent) -> TriggerManagementResult {
        self.update_triggers(&[(types, event)])
    }

    /// End active triggers of the given types. Triggers that cannot end are
    /// cancelled instead.
    pub fn end_triggers(&mut self, types: TriggerType) -> TriggerManagementResult {
        let mut result = TriggerManagementResult::default();
        if !self.has_active_triggers(types) {
            return result;
        }

        debug!(?types, "ending triggers");
        let mut i = 0;
        while i < self.active.len() {
            let index = self.active[i];
            if !types.intersects(self.triggers[index].trigger_type()) {
                i += 1;
                continue;
            }

            result.add(&self.triggers[index]);
            self.active.remove(i);
            let variables = self.ctx.variables.clone();
            if !self.triggers[index].can_end(variables.as_ref()) {
                self.triggers[index].cancel(&self.ctx);
                continue;
            }

            if self.triggers[index].overrides_other_triggers_on_end(variables.as_ref()) {
                self.cancel_triggers(TriggerType::ALL);
                self.triggers[index].end(&self.ctx, true);
                break;
            }
            self.triggers[index].end(&self.ctx, true);
        }
        result
    }

    pub fn cancel_triggers(&mut self, types: TriggerType) -> TriggerManagementResult {
        let mut result = TriggerManagementResult::default();
        if !self.has_active_triggers(types) {
            return result;
        }

        debug!(?types, "cancelling triggers");
        let triggers = &mut self.triggers;
        let ctx = &self.ctx;
        self.active.retain(|index| {
            let trigger = &mut triggers[*index];
            if !types.intersects(trigger.trigger_type()) {
                return true;
            }
            result.add(trigger);
            trigger.cancel(ctx);
            false
        });
        result
    }

    /// Cancel every active trigger except the one at `keep`
    pub fn cancel_triggers_except(&mut self, keep: usize) {
        let triggers = &mut self.triggers;
        let ctx = &self.ctx;
        self.active.retain(|index| {
            if *index == keep {
                return true;
            }
            triggers[*index].cancel(ctx);
            false
        });
    }

    /// Index of the trigger in the configured list, for use with
    /// [`TriggerHandler::cancel_triggers_except`] and [`TriggerHandler::end_trigger`]
    pub fn active_indices(&self, types: TriggerType) -> Vec<usize> {
        self.active
            .iter()
            .copied()
            .filter(|index| types.intersects(self.triggers[*index].trigger_type()))
            .collect()
    }

    pub fn trigger(&self, index: usize) -> Option<&Trigger> {
        self.triggers.get(index)
    }

    /// End one active trigger without the usual end checks
    pub fn end_trigger(&mut self, index: usize) {
        self.active.retain(|i| *i != index);
        if let Some(trigger) = self.triggers.get_mut(index) {
            trigger.end(&self.ctx, true);
        }
    }

    /// Releasing any key ends every active trigger, so that a modifier
    /// released mid-gesture does not leave it running
    pub fn keyboard_key(&mut self, pressed: bool) {
        if !pressed {
            self.end_triggers(TriggerType::ALL);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(
            std::iter::once(self.tick_timer.deadline())
                .chain(self.triggers.iter().map(Trigger::resume_deadline)),
        )
    }

    pub fn dispatch_timers(&mut self) {
        let ctx = self.ctx.clone();
        for trigger in &mut self.triggers {
            trigger.poll_resume_timeout(&ctx);
        }
        while self.tick_timer.poll(ctx.clock.now()) {
            self.tick();
        }
    }

    /// Update time-based triggers by a fixed delta and run tick actions
    pub fn tick(&mut self) {
        if self.active.is_empty() {
            self.tick_timer.stop();
            return;
        }

        let event = TriggerUpdateEvent::new(TICK_DELTA);
        let result = self.update_triggers_of(TriggerType::TIME_BASED, event);
        for index in self.active.clone() {
            self.triggers[index].tick(&self.ctx);
        }
        if result.success {
            debug!(delta = TICK_DELTA, "time-based triggers updated");
        }
    }
}

impl std::fmt::Debug for TriggerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHandler")
            .field("triggers", &self.triggers.len())
            .field("active", &self.active)
            .field("tick_timer", &self.tick_timer)
            .finish()
    }
}
