//! Triggers
//!
//! A [`Trigger`] is one configured gesture or shortcut. Handlers offer it
//! activation, feed it deltas and finally end or cancel it. The trigger
//! itself only tracks the threshold and forwards lifecycle points to its
//! actions.

mod direction;
mod stroke;

pub use self::direction::{
    AngleRange, PinchDirection, RotateDirection, SwipeDirection, WheelDirection,
};
pub use self::stroke::{Stroke, MIN_MATCHING_SCORE, STROKE_POINTS};

use crate::action::{ActionContext, On, TriggerAction};
use crate::condition::ConditionHandle;
use crate::context::EngineContext;
use crate::geometry::{Delta, PointDelta, Range};
use crate::input::keys::{KeySet, MouseButton};
use crate::timer::Timer;
use crate::variables::{VariableStore, LAST_TRIGGER_ID};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TriggerType: u16 {
        const CLICK = 1 << 0;
        const HOVER = 1 << 1;
        const KEYBOARD_SHORTCUT = 1 << 2;
        const PINCH = 1 << 3;
        const PRESS = 1 << 4;
        const ROTATE = 1 << 5;
        const STROKE = 1 << 6;
        const SWIPE = 1 << 7;
        const TAP = 1 << 8;
        const WHEEL = 1 << 9;

        const PINCH_ROTATE = Self::PINCH.bits() | Self::ROTATE.bits();
        const STROKE_SWIPE = Self::STROKE.bits() | Self::SWIPE.bits();
        const ALL = (1 << 10) - 1;
    }
}

impl TriggerType {
    /// Types updated by the periodic tick rather than by motion
    pub const TIME_BASED: TriggerType = TriggerType::CLICK
        .union(TriggerType::KEYBOARD_SHORTCUT)
        .union(TriggerType::HOVER)
        .union(TriggerType::PRESS);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSpeed {
    #[default]
    Any,
    Slow,
    Fast,
}

/// Context a trigger is activated in. Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerActivationEvent {
    pub keyboard_keys: Option<KeySet>,
    pub mouse_buttons: Option<Vec<MouseButton>>,
}

/// Direction information carried by an update, matched per trigger kind
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum UpdateDirection {
    #[default]
    None,
    Swipe {
        /// Angle of this event's delta
        angle: f64,
        /// Angle of the motion accumulated since the gesture started
        average_angle: f64,
    },
    Pinch(PinchDirection),
    Rotate(RotateDirection),
    Wheel(WheelDirection),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TriggerUpdateEvent {
    pub delta: Delta,
    /// Point delta multiplied by the handler's multiplier, passed to actions
    pub delta_multiplied: PointDelta,
    pub speed: TriggerSpeed,
    pub direction: UpdateDirection,
}

impl TriggerUpdateEvent {
    pub fn new(delta: impl Into<Delta>) -> Self {
        Self {
            delta: delta.into(),
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed: TriggerSpeed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_direction(mut self, direction: UpdateDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_delta_multiplied(mut self, delta: PointDelta) -> Self {
        self.delta_multiplied = delta;
        self
    }
}

/// Matching rules specific to a kind of trigger
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    /// Click, hover, press and tap
    Plain,
    KeyboardShortcut { keys: KeySet },
    Pinch { direction: PinchDirection },
    Rotate { direction: RotateDirection },
    Stroke { strokes: Vec<Stroke> },
    Swipe { angles: AngleRange },
    Wheel {
        direction: WheelDirection,
        /// Keep updating while a modifier or button is held
        continuous: bool,
    },
}

impl TriggerKind {
    fn is_motion(&self) -> bool {
        matches!(
            self,
            TriggerKind::Pinch { .. }
                | TriggerKind::Rotate { .. }
                | TriggerKind::Stroke { .. }
                | TriggerKind::Swipe { .. }
        )
    }
}

pub struct Trigger {
    trigger_type: TriggerType,
    kind: TriggerKind,
    actions: Vec<TriggerAction>,

    pub id: String,
    /// Must be satisfied for the trigger to activate
    pub activation_condition: Option<ConditionHandle>,
    /// Must be satisfied for the trigger to end, otherwise it is cancelled
    pub end_condition: Option<ConditionHandle>,
    /// Block the events performing this trigger while it is active
    pub block_events: bool,
    /// Release keyboard modifiers on start. Set by default once an action writes input.
    pub clear_modifiers: Option<bool>,
    /// Publish the id as `last_trigger_id`
    pub set_last_trigger: bool,
    /// Range of accumulated absolute delta in which the trigger may run
    pub threshold: Option<Range>,
    /// Mouse buttons that must be pressed before and during the trigger
    pub mouse_buttons: Vec<MouseButton>,
    pub mouse_buttons_exact_order: bool,
    pub speed: TriggerSpeed,
    /// How long an ended trigger waits to be resumed. Zero disables resuming.
    pub resume_timeout: Duration,
    /// Mouse press triggers only: activate after the press timeout without
    /// waiting for motion
    pub instant: bool,

    started: bool,
    absolute_accumulated_delta: f64,
    within_threshold: bool,
    resume_timer: Timer,
}

impl Trigger {
    /// A trigger without type-specific rules (click, hover, press, tap)
    pub fn new(trigger_type: TriggerType) -> Self {
        Self::with_kind(trigger_type, TriggerKind::Plain)
    }

    pub fn keyboard_shortcut(keys: impl IntoIterator<Item = u16>) -> Self {
        let keys = keys.into_iter().collect();
        Self::with_kind(TriggerType::KEYBOARD_SHORTCUT, TriggerKind::KeyboardShortcut { keys })
    }

    pub fn pinch(direction: PinchDirection) -> Self {
        Self::with_kind(TriggerType::PINCH, TriggerKind::Pinch { direction })
    }

    pub fn rotate(direction: RotateDirection) -> Self {
        Self::with_kind(TriggerType::ROTATE, TriggerKind::Rotate { direction })
    }

    pub fn stroke(strokes: Vec<Stroke>) -> Self {
        Self::with_kind(TriggerType::STROKE, TriggerKind::Stroke { strokes })
    }

    pub fn swipe(direction: SwipeDirection) -> Self {
        Self::swipe_angles(direction.into())
    }

    pub fn swipe_angles(angles: AngleRange) -> Self {
        Self::with_kind(TriggerType::SWIPE, TriggerKind::Swipe { angles })
    }

    pub fn wheel(direction: WheelDirection, continuous: bool) -> Self {
        Self::with_kind(
            TriggerType::WHEEL,
            TriggerKind::Wheel {
                direction,
                continuous,
            },
        )
    }

    fn with_kind(trigger_type: TriggerType, kind: TriggerKind) -> Self {
        Self {
            trigger_type,
            kind,
            actions: Vec::new(),
            id: String::new(),
            activation_condition: None,
            end_condition: None,
            block_events: true,
            clear_modifiers: None,
            set_last_trigger: true,
            threshold: None,
            mouse_buttons: Vec::new(),
            mouse_buttons_exact_order: false,
            speed: TriggerSpeed::Any,
            resume_timeout: Duration::ZERO,
            instant: false,
            started: false,
            absolute_accumulated_delta: 0.0,
            within_threshold: false,
            resume_timer: Timer::new(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_action(mut self, action: TriggerAction) -> Self {
        self.add_action(action);
        self
    }

    pub fn with_threshold(mut self, threshold: Range) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_mouse_buttons(mut self, buttons: Vec<MouseButton>, exact_order: bool) -> Self {
        self.mouse_buttons = buttons;
        self.mouse_buttons_exact_order = exact_order;
        self
    }

    pub fn with_activation_condition(mut self, condition: ConditionHandle) -> Self {
        self.activation_condition = Some(condition);
        self
    }

    pub fn with_end_condition(mut self, condition: ConditionHandle) -> Self {
        self.end_condition = Some(condition);
        self
    }

    pub fn with_speed(mut self, speed: TriggerSpeed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_block_events(mut self, block: bool) -> Self {
        self.block_events = block;
        self
    }

    pub fn with_clear_modifiers(mut self, clear: bool) -> Self {
        self.clear_modifiers = Some(clear);
        self
    }

    pub fn with_resume_timeout(mut self, timeout: Duration) -> Self {
        self.resume_timeout = timeout;
        self
    }

    pub fn with_instant(mut self, instant: bool) -> Self {
        self.instant = instant;
        self
    }

    pub fn add_action(&mut self, action: TriggerAction) {
        if action.emits_input() && self.clear_modifiers.is_none() {
            self.clear_modifiers = Some(true);
        }
        self.actions.push(action);
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    pub fn actions(&self) -> &[TriggerAction] {
        &self.actions
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_within_threshold(&self) -> bool {
        self.within_threshold
    }

    pub fn absolute_accumulated_delta(&self) -> f64 {
        self.absolute_accumulated_delta
    }

    pub fn strokes(&self) -> &[Stroke] {
        match &self.kind {
            TriggerKind::Stroke { strokes } => strokes,
            _ => &[],
        }
    }

    /// Motion triggers with a speed end instead of being cancelled when they
    /// can no longer update: the gesture was performed, only the speed changed.
    pub fn end_if_cannot_update(&self) -> bool {
        self.kind.is_motion() && self.speed != TriggerSpeed::Any
    }

    pub fn has_speed(&self) -> bool {
        self.kind.is_motion() && self.speed != TriggerSpeed::Any
    }

    pub fn can_activate(&self, event: &TriggerActivationEvent, variables: &dyn VariableStore) -> bool {
        if !self.mouse_buttons.is_empty() {
            if let Some(pressed) = &event.mouse_buttons {
                if !self.mouse_buttons_match(pressed) {
                    return false;
                }
            }
        }

        if let TriggerKind::KeyboardShortcut { keys } = &self.kind {
            if event.keyboard_keys.as_ref() != Some(keys) {
                return false;
            }
        }

        self.activation_condition
            .as_ref()
            .map_or(true, |condition| condition.satisfied(variables))
    }

    fn mouse_buttons_match(&self, pressed: &[MouseButton]) -> bool {
        if self.mouse_buttons_exact_order {
            return self.mouse_buttons == pressed;
        }
        self.mouse_buttons.len() == pressed.len()
            && self.mouse_buttons.iter().all(|button| pressed.contains(button))
    }

    pub fn can_update(&self, event: &TriggerUpdateEvent) -> bool {
        if self.kind.is_motion() && self.speed != TriggerSpeed::Any && self.speed != event.speed {
            return false;
        }

        match (&self.kind, event.direction) {
            // the average keeps single-sample jitter from cancelling the gesture
            (TriggerKind::Swipe { angles }, UpdateDirection::Swipe { average_angle, .. }) => {
                angles.accepts(average_angle)
            }
            (TriggerKind::Pinch { direction }, UpdateDirection::Pinch(actual)) => {
                direction.accepts(actual)
            }
            (TriggerKind::Rotate { direction }, UpdateDirection::Rotate(actual)) => {
                direction.accepts(actual)
            }
            (TriggerKind::Wheel { direction, .. }, UpdateDirection::Wheel(actual)) => {
                direction.accepts(actual)
            }
            _ => true,
        }
    }

    pub fn update(&mut self, event: &TriggerUpdateEvent, ctx: &EngineContext) {
        self.absolute_accumulated_delta += event.delta.unaccelerated.abs();
        self.within_threshold = self
            .threshold
            .map_or(true, |threshold| threshold.contains(self.absolute_accumulated_delta));
        if !self.within_threshold {
            debug!(
                id = %self.id,
                current = self.absolute_accumulated_delta,
                threshold = ?self.threshold,
                "threshold not reached"
            );
            return;
        }

        if !self.started {
            debug!(id = %self.id, "trigger started");
            self.started = true;
            if self.clear_modifiers == Some(true) {
                debug!(id = %self.id, "clearing keyboard modifiers");
                ctx.emitter.keyboard_clear_modifiers();
            }
            let action_ctx = action_context(ctx, event.delta_multiplied);
            for action in &mut self.actions {
                action.trigger_started(&action_ctx);
            }
        }

        if self.set_last_trigger {
            ctx.variables.set(LAST_TRIGGER_ID, Some(self.id.as_str().into()));
        }
        self.update_actions(event, ctx);
    }

    fn update_actions(&mut self, event: &TriggerUpdateEvent, ctx: &EngineContext) {
        let mut delta = event.delta;
        if let (TriggerKind::Swipe { angles }, UpdateDirection::Swipe { angle, .. }) =
            (&self.kind, event.direction)
        {
            // positive in the normal window, negative in the opposite one; the normal window wins on overlap
            if !angles.matches(angle) && angles.matches_opposite(angle) {
                delta = delta.negated();
            }
        }

        let action_ctx = action_context(ctx, event.delta_multiplied);
        for action in &mut self.actions {
            action.trigger_updated(delta.accelerated, &action_ctx);
        }
    }

    pub fn tick(&mut self, ctx: &EngineContext) {
        if !self.started {
            return;
        }
        let action_ctx = action_context(ctx, PointDelta::default());
        for action in &mut self.actions {
            action.trigger_ticked(&action_ctx);
        }
    }

    pub fn can_end(&self, variables: &dyn VariableStore) -> bool {
        self.within_threshold
            && self
                .end_condition
                .as_ref()
                .map_or(true, |condition| condition.satisfied(variables))
    }

    /// End the trigger. With a resume timeout set, a started trigger is
    /// suspended instead and can be resumed by the next activation.
    pub fn end(&mut self, ctx: &EngineContext, allow_resuming: bool) {
        if !self.started {
            self.reset();
            return;
        }

        if allow_resuming && !self.resume_timeout.is_zero() {
            debug!(id = %self.id, timeout = ?self.resume_timeout, "trigger suspended");
            self.resume_timer.start(ctx.clock.now(), self.resume_timeout);
            return;
        }

        debug!(id = %self.id, "trigger ended");
        if self.set_last_trigger {
            ctx.variables.set(LAST_TRIGGER_ID, Some(self.id.as_str().into()));
        }
        let action_ctx = action_context(ctx, PointDelta::default());
        for action in &mut self.actions {
            action.trigger_ended(&action_ctx);
        }
        self.reset();
    }

    pub fn cancel(&mut self, ctx: &EngineContext) {
        if !self.started {
            self.reset();
            return;
        }

        debug!(id = %self.id, "trigger cancelled");
        let action_ctx = action_context(ctx, PointDelta::default());
        for action in &mut self.actions {
            action.trigger_cancelled(&action_ctx);
        }
        self.reset();
    }

    /// Whether the trigger ended with a resume timeout and is waiting
    pub fn is_suspended(&self) -> bool {
        self.resume_timer.is_active()
    }

    /// Continue a suspended trigger where it left off
    pub fn resume(&mut self) {
        debug!(id = %self.id, "trigger resumed");
        self.resume_timer.stop();
    }

    pub fn resume_deadline(&self) -> Option<Instant> {
        self.resume_timer.deadline()
    }

    /// Completes the end of a suspended trigger once its resume timeout expires.
    /// Returns whether it did.
    pub fn poll_resume_timeout(&mut self, ctx: &EngineContext) -> bool {
        if !self.resume_timer.poll(ctx.clock.now()) {
            return false;
        }
        self.end(ctx, false);
        true
    }

    pub fn overrides_other_triggers_on_end(&self, variables: &dyn VariableStore) -> bool {
        self.within_threshold
            && self.actions.iter().any(|action| {
                matches!(action.on, On::End | On::EndCancel) && action.can_execute(variables)
            })
    }

    pub fn overrides_other_triggers_on_update(&self, variables: &dyn VariableStore) -> bool {
        self.within_threshold
            && self.actions.iter().any(|action| {
                action.executed() || (action.on == On::Update && action.can_execute(variables))
            })
    }

    fn reset(&mut self) {
        self.started = false;
        self.absolute_accumulated_delta = 0.0;
        self.within_threshold = false;
        self.resume_timer.stop();
    }
}

fn action_context(ctx: &EngineContext, delta_multiplied: PointDelta) -> ActionContext<'_> {
    ActionContext {
        emitter: ctx.emitter.as_ref(),
        variables: ctx.variables.as_ref(),
        delta_multiplied,
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.id)
            .field("type", &self.trigger_type)
            .field("kind", &self.kind)
            .field("started", &self.started)
            .field("absolute_accumulated_delta", &self.absolute_accumulated_delta)
            .finish_non_exhaustive()
    }
}
