//! Swipe and stroke recognition shared by every pointer-like device
//!
//! [`MotionTriggerHandler`] wraps the core [`TriggerHandler`] with the
//! per-gesture motion state: swipe axis, recorded deltas and speed sampling.
//! That state is reset whenever triggers are activated.

use super::{TriggerHandler, TriggerManagementResult};
use crate::context::EngineContext;
use crate::geometry::{Delta, Point, PointDelta};
use crate::input::InputDeviceType;
use crate::trigger::{
    PinchDirection, Stroke, TriggerActivationEvent, TriggerSpeed, TriggerType, TriggerUpdateEvent,
    UpdateDirection, MIN_MATCHING_SCORE,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Deltas needed before an axis change is considered
const AXIS_CHANGE_MIN_DELTA_COUNT: usize = 10;

/// Largest ratio between the minor and major axis for a turn to count as sharp
const AXIS_CHANGE_MAX_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Axis {
    #[default]
    None,
    Horizontal,
    Vertical,
}

/// Average delta per sampled event at or above which a gesture is fast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedThreshold {
    pub trigger_type: TriggerType,
    pub threshold: f64,
    /// Applies to every pinch direction when unset
    #[serde(default)]
    pub pinch_direction: Option<PinchDirection>,
}

impl SpeedThreshold {
    pub fn new(trigger_type: TriggerType, threshold: f64) -> Self {
        Self {
            trigger_type,
            threshold,
            pinch_direction: None,
        }
    }

    pub fn pinch(direction: PinchDirection, threshold: f64) -> Self {
        Self {
            trigger_type: TriggerType::PINCH,
            threshold,
            pinch_direction: Some(direction),
        }
    }

    fn applies_to(&self, trigger_type: TriggerType, pinch: Option<PinchDirection>) -> bool {
        self.trigger_type == trigger_type
            && match (self.pinch_direction, pinch) {
                (None, _) => true,
                (Some(own), Some(actual)) => own.accepts(actual),
                (Some(_), None) => false,
            }
    }
}

/// Default thresholds, in the units each gesture reports its delta in
pub fn default_speed_thresholds() -> Vec<SpeedThreshold> {
    vec![
        SpeedThreshold::pinch(PinchDirection::In, 0.04),
        SpeedThreshold::pinch(PinchDirection::Out, 0.08),
        SpeedThreshold::new(TriggerType::ROTATE, 5.0),
        SpeedThreshold::new(TriggerType::SWIPE, 20.0),
    ]
}

#[derive(Debug)]
pub struct MotionTriggerHandler {
    triggers: TriggerHandler,
    /// Multiplier applied to the point delta passed on to actions
    pub swipe_delta_multiplier: f64,
    /// Events sampled to determine the speed of a gesture
    pub input_events_to_sample: u8,
    speed_thresholds: Vec<SpeedThreshold>,

    axis: Axis,
    swipe_delta: Point,
    deltas: Vec<Point>,

    determining_speed: bool,
    sampled_events: u8,
    sampled_delta: f64,
    speed: Option<TriggerSpeed>,
}

impl MotionTriggerHandler {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            triggers: TriggerHandler::new(ctx),
            swipe_delta_multiplier: 1.0,
            input_events_to_sample: 3,
            speed_thresholds: default_speed_thresholds(),
            axis: Axis::None,
            swipe_delta: Point::default(),
            deltas: Vec::new(),
            determining_speed: false,
            sampled_events: 0,
            sampled_delta: 0.0,
            speed: None,
        }
    }

    pub fn triggers(&self) -> &TriggerHandler {
        &self.triggers
    }

    pub fn triggers_mut(&mut self) -> &mut TriggerHandler {
        &mut self.triggers
    }

    /// Replaces a threshold with the same type and pinch direction
    pub fn set_speed_threshold(&mut self, threshold: SpeedThreshold) {
        self.speed_thresholds.retain(|t| {
            t.trigger_type != threshold.trigger_type || t.pinch_direction != threshold.pinch_direction
        });
        self.speed_thresholds.push(threshold);
    }

    /// Deltas recorded since the last activation
    pub fn deltas(&self) -> &[Point] {
        &self.deltas
    }

    pub fn activate_triggers(
        &mut self,
        types: TriggerType,
        event: &TriggerActivationEvent,
    ) -> TriggerManagementResult {
        self.reset();
        let result = self.triggers.activate_triggers(types, event);
        if let Some(trigger) = self
            .triggers
            .active_triggers(TriggerType::ALL)
            .find(|trigger| trigger.has_speed())
        {
            debug!(id = %trigger.id, "trigger has speed");
            self.determining_speed = true;
        }
        result
    }

    /// End triggers, resolving strokes first: the best matching stroke
    /// trigger ends, every other stroke trigger is cancelled.
    pub fn end_triggers(&mut self, types: TriggerType) -> TriggerManagementResult {
        if types.intersects(TriggerType::STROKE) && !self.deltas.is_empty() {
            self.end_best_stroke();
        }
        self.triggers.end_triggers(types)
    }

    fn end_best_stroke(&mut self) {
        let stroke = Stroke::from_deltas(&self.deltas);
        debug!(deltas = self.deltas.len(), "stroke constructed");

        let variables = self.triggers.ctx().variables.clone();
        let mut best = None;
        let mut best_score = 0.0;
        for index in self.triggers.active_indices(TriggerType::STROKE) {
            let Some(trigger) = self.triggers.trigger(index) else {
                continue;
            };
            if !trigger.can_end(variables.as_ref()) {
                continue;
            }
            for reference in trigger.strokes() {
                let score = stroke.compare(reference);
                if score > best_score && score > MIN_MATCHING_SCORE {
                    best = Some(index);
                    best_score = score;
                }
            }
        }
        debug!(score = best_score, "stroke compared");

        if let Some(index) = best {
            self.triggers.cancel_triggers_except(index);
            self.triggers.end_trigger(index);
        }
        self.triggers.cancel_triggers(TriggerType::STROKE);
    }

    pub fn cancel_triggers(&mut self, types: TriggerType) -> TriggerManagementResult {
        self.triggers.cancel_triggers(types)
    }

    /// Feed motion into active swipe and stroke triggers.
    /// Returns whether the event should be blocked.
    pub fn handle_motion(
        &mut self,
        device_type: InputDeviceType,
        delta: PointDelta,
        activation: &TriggerActivationEvent,
    ) -> bool {
        if !self.triggers.has_active_triggers(TriggerType::STROKE_SWIPE) {
            return false;
        }

        let unaccelerated = delta.unaccelerated;
        self.deltas.push(unaccelerated);
        self.swipe_delta += unaccelerated;

        let Some(speed) = self.determine_speed(TriggerType::SWIPE, delta.unaccelerated_hypot(), None)
        else {
            return self.triggers.has_blocking_triggers(TriggerType::STROKE_SWIPE);
        };

        let mut events = Vec::with_capacity(2);
        let mut axis_changed = false;

        if self.triggers.has_active_triggers(TriggerType::SWIPE) {
            // a single delta is not enough to tell the direction
            if self.deltas.len() < 2 {
                return self.triggers.has_blocking_triggers(TriggerType::STROKE_SWIPE);
            }

            let mut average = self.swipe_delta;
            if self.axis == Axis::None {
                self.axis = if self.swipe_delta.x.abs() >= self.swipe_delta.y.abs() {
                    Axis::Horizontal
                } else {
                    Axis::Vertical
                };
            } else if let Some(recent) = self.sharp_turn() {
                self.axis = match self.axis {
                    Axis::Horizontal => Axis::Vertical,
                    _ => Axis::Horizontal,
                };
                axis_changed = true;
                average = recent;
                debug!(axis = ?self.axis, "swipe axis changed");
            }

            let along_axis = match self.axis {
                Axis::Vertical => Delta::new(delta.accelerated.y.abs(), unaccelerated.y.abs()),
                _ => Delta::new(delta.accelerated.x.abs(), unaccelerated.x.abs()),
            };
            let event = TriggerUpdateEvent::new(along_axis)
                .with_direction(UpdateDirection::Swipe {
                    angle: unaccelerated.angle(),
                    average_angle: average.angle(),
                })
                .with_delta_multiplied(delta * self.swipe_delta_multiplier)
                .with_speed(speed);
            events.push((TriggerType::SWIPE, event));
        }

        if self.triggers.has_active_triggers(TriggerType::STROKE) {
            let length = if device_type == InputDeviceType::Mouse {
                delta.accelerated_hypot()
            } else {
                delta.unaccelerated_hypot()
            };
            let event = TriggerUpdateEvent::new(length)
                .with_delta_multiplied(delta)
                .with_speed(speed);
            events.push((TriggerType::STROKE, event));
        }

        let result = self.triggers.update_triggers(&events);
        if axis_changed && !result.success {
            self.activate_triggers(TriggerType::SWIPE, activation);
            return self.handle_motion(device_type, delta, activation);
        }
        result.block
    }

    /// Sum of the recent deltas if they describe a sharp turn onto the other axis
    fn sharp_turn(&self) -> Option<Point> {
        if self.deltas.len() < AXIS_CHANGE_MIN_DELTA_COUNT {
            return None;
        }

        let recent = &self.deltas[self.deltas.len() - AXIS_CHANGE_MIN_DELTA_COUNT..];
        let (absolute, signed) = recent.iter().fold(
            (Point::default(), Point::default()),
            |(absolute, signed), delta| {
                (absolute + Point::new(delta.x.abs(), delta.y.abs()), signed + *delta)
            },
        );
        let ratio = absolute.x.min(absolute.y) / absolute.x.max(absolute.y);
        let turned = match self.axis {
            Axis::Horizontal => absolute.y > absolute.x,
            Axis::Vertical => absolute.x > absolute.y,
            Axis::None => false,
        };
        (ratio <= AXIS_CHANGE_MAX_RATIO && turned).then_some(signed)
    }

    /// Returns None while the speed is still being sampled, in which case the
    /// event must be blocked and not passed to triggers.
    pub fn determine_speed(
        &mut self,
        trigger_type: TriggerType,
        delta: f64,
        pinch: Option<PinchDirection>,
    ) -> Option<TriggerSpeed> {
        if !self.determining_speed {
            return Some(self.speed.unwrap_or_default());
        }

        let Some(threshold) = self
            .speed_thresholds
            .iter()
            .find(|threshold| threshold.applies_to(trigger_type, pinch))
            .map(|threshold| threshold.threshold)
        else {
            warn!(?trigger_type, "no speed threshold for trigger, assuming fast");
            self.determining_speed = false;
            self.speed = Some(TriggerSpeed::Fast);
            return self.speed;
        };

        if self.sampled_events != self.input_events_to_sample {
            self.sampled_events += 1;
            self.sampled_delta += delta.abs();
            debug!(
                event = self.sampled_events,
                of = self.input_events_to_sample,
                delta = self.sampled_delta,
                threshold,
                "determining speed"
            );
            return None;
        }

        self.determining_speed = false;
        let average = self.sampled_delta / f64::from(self.input_events_to_sample.max(1));
        let speed = if average >= threshold {
            TriggerSpeed::Fast
        } else {
            TriggerSpeed::Slow
        };
        debug!(?speed, "speed determined");
        self.speed = Some(speed);
        self.speed
    }

    fn reset(&mut self) {
        self.axis = Axis::None;
        self.swipe_delta = Point::default();
        self.deltas.clear();
        self.determining_speed = false;
        self.sampled_events = 0;
        self.sampled_delta = 0.0;
        self.speed = None;
    }
}
