//! Touchscreen triggers: tap, press, pinch, rotate, stroke and swipe
//!
//! Contacts are blocked from the first touch-down when a trigger that blocks
//! events could activate. Once recognition settles on something that does
//! not block, the contacts still held are replayed through the emitter. A
//! tap nothing consumed is handed back as a simulated tap.
//!
//! Positions are in millimetres.

use super::multitouch::MultiTouchMotionTriggerHandler;
use super::InputEventHandler;
use crate::context::EngineContext;
use crate::geometry::{Point, PointDelta};
use crate::input::{DeviceId, InputDevice, InputDeviceType, InputEvent, TouchPoint};
use crate::timer::{earliest, Timer};
use crate::trigger::{TriggerActivationEvent, TriggerType, TriggerUpdateEvent};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const MOTION_THRESHOLD_MM: f64 = 4.0;
const HOLD_TIMEOUT: Duration = Duration::from_millis(200);
const TAP_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchscreenState {
    #[default]
    None,
    /// Contacts are down and recognition has not settled yet
    Touch,
    Hold,
    /// Every contact moves the same way
    Motion,
    Pinch,
}

/// A contact of the current gesture, kept after it is lifted for tap detection
#[derive(Debug, Clone, Copy)]
struct GesturePoint {
    id: i32,
    down: Instant,
    initial_position: Point,
    position: Point,
    raw_position: Point,
    lifted: bool,
}

impl GesturePoint {
    fn new(point: &TouchPoint, now: Instant) -> Self {
        Self {
            id: point.id,
            down: point.down_timestamp.unwrap_or(now),
            initial_position: point.position,
            position: point.position,
            raw_position: point.raw_position,
            lifted: false,
        }
    }

    fn delta(&self) -> Point {
        self.position - self.initial_position
    }

    fn moved(&self) -> bool {
        self.delta().hypot() >= MOTION_THRESHOLD_MM
    }
}

fn centroid<'a>(points: impl Iterator<Item = &'a GesturePoint>) -> Point {
    let (sum, count) = points.fold((Point::default(), 0usize), |(sum, count), point| {
        (sum + point.position, count + 1)
    });
    sum / count.max(1) as f64
}

/// Distance between the first two contacts and the clockwise angle of the line joining them
fn pinch_info<'a>(mut points: impl Iterator<Item = &'a GesturePoint>) -> (f64, f64) {
    match (points.next(), points.next()) {
        (Some(a), Some(b)) => {
            let line = b.position - a.position;
            (line.hypot(), 360.0 - line.angle())
        }
        _ => (0.0, 0.0),
    }
}

#[derive(Debug)]
pub struct TouchscreenTriggerHandler {
    device: DeviceId,
    multitouch: MultiTouchMotionTriggerHandler,
    state: TouchscreenState,
    /// Contacts of the current sequence are being withheld from the environment
    block: bool,

    hold_timer: Timer,
    points: Vec<GesturePoint>,
    previous_centroid: Point,
    initial_distance: f64,
    previous_angle: f64,
    simulated_tap: Option<Vec<Point>>,
}

impl TouchscreenTriggerHandler {
    pub fn new(ctx: EngineContext, device: DeviceId) -> Self {
        Self {
            device,
            multitouch: MultiTouchMotionTriggerHandler::new(ctx),
            state: TouchscreenState::None,
            block: false,
            hold_timer: Timer::new(),
            points: Vec::new(),
            previous_centroid: Point::default(),
            initial_distance: 0.0,
            previous_angle: 0.0,
            simulated_tap: None,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn state(&self) -> TouchscreenState {
        self.state
    }

    pub fn multitouch(&self) -> &MultiTouchMotionTriggerHandler {
        &self.multitouch
    }

    pub fn multitouch_mut(&mut self) -> &mut MultiTouchMotionTriggerHandler {
        &mut self.multitouch
    }

    /// Positions of a tap that no trigger consumed but whose contacts were
    /// blocked. The caller replays it through
    /// [`InputDevice::touchscreen_tap`].
    pub fn take_simulated_tap(&mut self) -> Option<Vec<Point>> {
        self.simulated_tap.take()
    }

    fn ctx(&self) -> &EngineContext {
        self.multitouch.motion().triggers().ctx()
    }

    fn now(&self) -> Instant {
        self.ctx().clock.now()
    }

    fn held(&self) -> impl Iterator<Item = &GesturePoint> + '_ {
        self.points.iter().filter(|point| !point.lifted)
    }

    fn could_block(&self) -> bool {
        let event = TriggerActivationEvent::default();
        let could = self
            .multitouch
            .motion()
            .triggers()
            .activatable_triggers(TriggerType::ALL, &event)
            .any(|trigger| trigger.block_events);
        could
    }

    /// Change whether contacts are withheld. Contacts the environment has
    /// not seen are pressed when unblocking, the ones it has seen are
    /// released when blocking. `skip` is the contact of the event being
    /// handled, which passes through on its own.
    fn set_block(&mut self, block: bool, skip: Option<i32>) {
        if self.block == block {
            return;
        }
        debug!(block, "touchscreen blocking changed");
        self.block = block;

        let emitter = self.ctx().emitter.clone();
        for point in self.held().filter(|point| Some(point.id) != skip) {
            if block {
                emitter.touchscreen_touch_up(point.id);
            } else {
                emitter.touchscreen_touch_down(point.id, point.raw_position);
            }
        }
    }

    fn set_state(&mut self, state: TouchscreenState) {
        trace!(from = ?self.state, to = ?state, "touchscreen state changed");
        if self.state == TouchscreenState::Touch {
            self.hold_timer.stop();
        }
        if matches!(
            self.state,
            TouchscreenState::Hold | TouchscreenState::Motion | TouchscreenState::Pinch
        ) {
            if state == TouchscreenState::None {
                self.multitouch.motion_mut().end_triggers(TriggerType::ALL);
            } else {
                self.multitouch.motion_mut().cancel_triggers(TriggerType::ALL);
            }
        }

        self.state = state;
        let event = TriggerActivationEvent::default();
        match state {
            TouchscreenState::Touch => {
                let now = self.now();
                self.hold_timer.start(now, HOLD_TIMEOUT);
            }
            TouchscreenState::Hold => {
                if !self.multitouch.activate_triggers(TriggerType::PRESS, &event).block {
                    self.set_block(false, None);
                }
            }
            TouchscreenState::Motion => {
                let result = self
                    .multitouch
                    .activate_triggers(TriggerType::STROKE_SWIPE, &event);
                self.set_block(result.block, None);

                // the distance travelled while recognizing counts towards the gesture
                let initial = self
                    .held()
                    .fold(Point::default(), |sum, point| sum + point.initial_position)
                    / self.held().count().max(1) as f64;
                self.previous_centroid = centroid(self.held());
                let delta = PointDelta::from(self.previous_centroid - initial);
                self.multitouch
                    .motion_mut()
                    .handle_motion(InputDeviceType::Touchscreen, delta, &event);
            }
            TouchscreenState::Pinch => {
                (self.initial_distance, self.previous_angle) = pinch_info(self.held());
                let result = self
                    .multitouch
                    .activate_triggers(TriggerType::PINCH_ROTATE, &event);
                self.set_block(result.block, None);
            }
            TouchscreenState::None => {}
        }
    }

    /// Forget everything recognized so far and treat the held contacts as a new touch
    fn begin_recognition(&mut self, device: &InputDevice) {
        let now = self.now();
        self.points = device
            .physical_state()
            .valid_touch_points()
            .into_iter()
            .map(|point| GesturePoint::new(point, now))
            .collect();
    }

    fn touch_down(&mut self, device: &InputDevice, id: i32) -> bool {
        self.multitouch.update_variables(Some(device));
        if self.state == TouchscreenState::None {
            self.simulated_tap = None;
            self.points.clear();
            self.block = self.could_block();
        } else if self.block && !self.could_block() {
            self.set_block(false, Some(id));
        }

        match self.state {
            TouchscreenState::None | TouchscreenState::Touch => {
                let now = self.now();
                if let Some(point) = device.physical_state().find_touch_point(id) {
                    self.points.push(GesturePoint::new(point, now));
                }
            }
            _ => {
                self.multitouch.motion_mut().cancel_triggers(TriggerType::ALL);
                self.state = TouchscreenState::Touch;
                self.begin_recognition(device);
            }
        }
        self.set_state(TouchscreenState::Touch);
        self.block
    }

    fn touch_changed(&mut self, device: &InputDevice, id: i32) -> bool {
        let Some(current) = device.physical_state().find_touch_point(id) else {
            return self.block;
        };
        if let Some(point) = self.points.iter_mut().find(|point| point.id == id && !point.lifted) {
            point.position = current.position;
            point.raw_position = current.raw_position;
        }
        self.multitouch.update_variables(Some(device));

        match self.state {
            TouchscreenState::Touch | TouchscreenState::Hold => {
                if self.held().any(GesturePoint::moved) {
                    // a moving contact rules out holding
                    self.hold_timer.stop();
                }
                if !self.held().all(GesturePoint::moved) {
                    return self.block;
                }

                let first = self.held().next().map(GesturePoint::delta).unwrap_or_default();
                let same_direction = self.held().all(|point| {
                    let delta = point.delta();
                    delta.x * first.x + delta.y * first.y > 0.0
                });
                let state = if same_direction {
                    TouchscreenState::Motion
                } else {
                    TouchscreenState::Pinch
                };
                debug!(?state, "touchscreen gesture recognized");
                self.set_state(state);
            }
            TouchscreenState::Motion => {
                let center = centroid(self.held());
                let delta = PointDelta::from(center - self.previous_centroid);
                self.previous_centroid = center;
                let block = self.multitouch.motion_mut().handle_motion(
                    InputDeviceType::Touchscreen,
                    delta,
                    &TriggerActivationEvent::default(),
                );
                self.set_block(block, None);
            }
            TouchscreenState::Pinch => {
                let (distance, angle) = pinch_info(self.held());
                let scale = if self.initial_distance > 0.0 {
                    distance / self.initial_distance
                } else {
                    1.0
                };
                let mut angle_delta = angle - self.previous_angle;
                if angle_delta > 180.0 {
                    angle_delta -= 360.0;
                } else if angle_delta < -180.0 {
                    angle_delta += 360.0;
                }
                self.previous_angle = angle;

                let block = self.multitouch.handle_pinch(scale, angle_delta);
                self.set_block(block, None);
            }
            TouchscreenState::None => {}
        }
        self.block
    }

    fn touch_up(&mut self, device: &InputDevice, id: i32) -> bool {
        let block = self.block;
        if let Some(point) = self.points.iter_mut().find(|point| point.id == id && !point.lifted) {
            point.lifted = true;
        }

        if !device.physical_state().valid_touch_points().is_empty() {
            if matches!(
                self.state,
                TouchscreenState::Hold | TouchscreenState::Motion | TouchscreenState::Pinch
            ) {
                self.multitouch.motion_mut().cancel_triggers(TriggerType::ALL);
                self.state = TouchscreenState::Touch;
                self.begin_recognition(device);
                self.multitouch.update_variables(Some(device));
                self.set_state(TouchscreenState::Touch);
            }
            return block;
        }

        if self.state == TouchscreenState::Touch {
            let now = self.now();
            let tap = self
                .points
                .iter()
                .all(|point| now.duration_since(point.down) <= TAP_TIMEOUT && !point.moved());
            if tap {
                self.tap();
            }
        }
        self.set_state(TouchscreenState::None);
        self.multitouch.update_variables(None);
        self.points.clear();
        self.block = false;
        block
    }

    fn tap(&mut self) {
        let result = self
            .multitouch
            .activate_triggers(TriggerType::TAP, &TriggerActivationEvent::default());
        if result.success {
            let triggers = self.multitouch.motion_mut().triggers_mut();
            triggers.update_triggers_of(TriggerType::TAP, TriggerUpdateEvent::new(0.0));
            triggers.end_triggers(TriggerType::TAP);
        }

        if !result.block && self.block {
            debug!("unconsumed touchscreen tap");
            self.simulated_tap = Some(self.points.iter().map(|point| point.raw_position).collect());
        }
    }

    fn touch_cancel(&mut self) -> bool {
        let block = self.block;
        self.multitouch.motion_mut().cancel_triggers(TriggerType::ALL);
        self.state = TouchscreenState::None;
        self.hold_timer.stop();
        self.points.clear();
        self.multitouch.update_variables(None);
        self.block = false;
        block
    }
}

impl InputEventHandler for TouchscreenTriggerHandler {
    fn handle_event(&mut self, device: &InputDevice, event: &InputEvent) -> bool {
        if let InputEvent::KeyboardKey { pressed, .. } = event {
            self.multitouch.motion_mut().triggers_mut().keyboard_key(*pressed);
            return false;
        }
        if device.id != self.device {
            return false;
        }

        match event {
            InputEvent::TouchDown { id, .. } => self.touch_down(device, *id),
            InputEvent::TouchChanged { id, .. } => self.touch_changed(device, *id),
            InputEvent::TouchUp { id } => self.touch_up(device, *id),
            InputEvent::TouchCancel => self.touch_cancel(),
            _ => false,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.hold_timer.deadline(),
            self.multitouch.motion().triggers().next_deadline(),
        ])
    }

    fn dispatch_timers(&mut self) {
        let now = self.now();
        if self.hold_timer.poll(now) && self.state == TouchscreenState::Touch {
            self.set_state(TouchscreenState::Hold);
        }
        self.multitouch.motion_mut().triggers_mut().dispatch_timers();
    }
}
