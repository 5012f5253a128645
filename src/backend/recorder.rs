//! Stroke recording

use crate::geometry::Point;
use crate::input::{GesturePhase, InputDevice, InputDeviceType, InputEvent};
use crate::timer::Timer;
use crate::trigger::{Stroke, TriggerType};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Pointer inactivity that finishes a recording
pub const STROKE_RECORD_TIMEOUT: Duration = Duration::from_millis(250);

type StrokeCallback = Box<dyn FnOnce(Stroke)>;

/// Collects motion deltas while the user draws a stroke to configure a
/// trigger with. Touchpad gestures are swallowed for the duration.
#[derive(Default)]
pub(super) struct StrokeRecorder {
    callback: Option<StrokeCallback>,
    deltas: Vec<Point>,
    timer: Timer,
}

impl fmt::Debug for StrokeRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrokeRecorder")
            .field("recording", &self.is_recording())
            .field("deltas", &self.deltas.len())
            .finish()
    }
}

impl StrokeRecorder {
    pub fn start(&mut self, callback: StrokeCallback) {
        debug!("stroke recording started");
        self.deltas.clear();
        self.callback = Some(callback);
    }

    pub fn is_recording(&self) -> bool {
        self.callback.is_some()
    }

    /// Some(block) when the event was consumed, None when the handlers
    /// should see it as well
    pub fn handle_event(&mut self, device: &InputDevice, event: &InputEvent, now: Instant) -> Option<bool> {
        if !self.is_recording() {
            return None;
        }

        match event {
            InputEvent::PointerAxis { delta, .. } if device.device_type == InputDeviceType::Touchpad => {
                if delta.is_null() {
                    self.finish();
                } else {
                    self.deltas.push(delta.unaccelerated);
                }
                Some(true)
            }
            InputEvent::PointerMotion { delta } => {
                self.deltas.push(delta.accelerated);
                self.timer.start(now, STROKE_RECORD_TIMEOUT);
                None
            }
            InputEvent::TouchpadGesture { phase, triggers, .. } => {
                if *phase != GesturePhase::Begin && triggers.intersects(TriggerType::STROKE_SWIPE) {
                    self.finish();
                }
                Some(true)
            }
            InputEvent::TouchpadPinch { .. } => Some(true),
            InputEvent::TouchpadSwipe { delta } => {
                self.deltas.push(delta.unaccelerated);
                Some(true)
            }
            _ => None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn dispatch_timers(&mut self, now: Instant) {
        if self.timer.poll(now) {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.timer.stop();
        let deltas = std::mem::take(&mut self.deltas);
        if let Some(callback) = self.callback.take() {
            debug!(deltas = deltas.len(), "stroke recording finished");
            callback(Stroke::from_deltas(&deltas));
        }
    }
}
