//! Semantic event surface
//!
//! Compositors hand over libinput events that are already interpreted:
//! gesture lifecycles with a finger count, pointer axis values, button
//! scan codes. [`LibinputBackend`] turns them into raw [`InputEvent`]s for
//! the [`InputBackend`] and complements touchpads with their evdev node,
//! which is the only place individual contacts and pressure are visible.

use super::evdev::{EvdevDecoder, EvdevSource};
use super::InputBackend;
use crate::geometry::{Point, PointDelta};
use crate::input::{DeviceId, GesturePhase, InputDeviceProperties, InputDeviceType, InputEvent, MouseButton};
use crate::trigger::TriggerType;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace, warn};

struct EvdevReader {
    source: Box<dyn EvdevSource>,
    decoder: EvdevDecoder,
}

/// Per-device state of the axis merging for sources that report each axis
/// in a separate event
#[derive(Debug, Default)]
struct AxisMerge {
    scrolling: bool,
    held: Option<PointDelta>,
    last_block: bool,
}

enum AxisStep {
    Process(PointDelta),
    Split(PointDelta, PointDelta),
    Hold(bool),
}

fn same_axis(a: &PointDelta, b: &PointDelta) -> bool {
    (a.unaccelerated.x != 0.0) == (b.unaccelerated.x != 0.0)
}

pub struct LibinputBackend {
    backend: InputBackend,
    evdev: HashMap<DeviceId, EvdevReader>,
    axes: HashMap<DeviceId, AxisMerge>,
    /// Some gesture updates and ends arrive without their device
    last_device: Option<DeviceId>,
    fingers: u8,
    /// Decision of the last gesture begin or update
    gesture_blocked: bool,
    previous_pointer_position: Option<Point>,
}

impl fmt::Debug for LibinputBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibinputBackend")
            .field("backend", &self.backend)
            .field("evdev_devices", &self.evdev.len())
            .field("last_device", &self.last_device)
            .field("fingers", &self.fingers)
            .field("gesture_blocked", &self.gesture_blocked)
            .finish_non_exhaustive()
    }
}

impl LibinputBackend {
    pub fn new(backend: InputBackend) -> Self {
        Self {
            backend,
            evdev: HashMap::new(),
            axes: HashMap::new(),
            last_device: None,
            fingers: 0,
            gesture_blocked: false,
            previous_pointer_position: None,
        }
    }

    pub fn backend(&self) -> &InputBackend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut InputBackend {
        &mut self.backend
    }

    fn ignored(&self) -> bool {
        self.backend.ignore_flag().is_set()
    }

    fn device_type(&self, device: DeviceId) -> Option<InputDeviceType> {
        self.backend.device(device).map(|device| device.device_type)
    }

    /// Read the device node alongside libinput. Does nothing if the device
    /// opted out through `handle_evdev`.
    pub fn attach_evdev(
        &mut self,
        device: DeviceId,
        source: Box<dyn EvdevSource>,
        decoder: EvdevDecoder,
        detected: &InputDeviceProperties,
    ) {
        if !self.backend.device(device).is_some_and(|d| d.properties.handle_evdev()) {
            debug!(%device, "not reading evdev node");
            return;
        }
        self.backend.update_detected_properties(device, detected);
        self.evdev.insert(device, EvdevReader { source, decoder });
    }

    pub fn remove_device(&mut self, device: DeviceId) {
        self.evdev.remove(&device);
        self.axes.remove(&device);
        if self.last_device == Some(device) {
            self.last_device = None;
        }
        self.backend.remove_device(device);
    }

    /// Drain every attached evdev source
    pub fn poll_evdev(&mut self) {
        if self.ignored() {
            return;
        }
        let devices: Vec<DeviceId> = self.evdev.keys().copied().collect();
        for device in devices {
            let Some(reader) = self.evdev.get_mut(&device) else {
                continue;
            };
            match reader.source.fetch() {
                Ok(events) => self.process_evdev(device, &events),
                Err(err) => warn!(%device, %err, "failed to read evdev events"),
            }
        }
    }

    /// Feed raw events of a device through its decoder
    pub fn process_evdev(&mut self, device: DeviceId, events: &[evdev::InputEvent]) {
        let ctx = self.backend.ctx().clone();
        for raw in events {
            let Some(reader) = self.evdev.get_mut(&device) else {
                return;
            };
            let Some(input_device) = self.backend.device_mut(device) else {
                return;
            };
            for event in reader.decoder.process(raw, input_device, &ctx) {
                // the compositor already received these, blocking is up to libinput events
                self.backend.handle_event(device, &event);
            }
        }
    }

    pub fn keyboard_key(&mut self, device: DeviceId, key: u16, pressed: bool) -> bool {
        if self.ignored() {
            return false;
        }
        self.backend.handle_event(device, &InputEvent::KeyboardKey { key, pressed })
    }

    /// Scroll or wheel. `one_axis_per_event` is set by sources that report
    /// horizontal and vertical movement in separate events.
    pub fn pointer_axis(&mut self, device: DeviceId, delta: Point, one_axis_per_event: bool) -> bool {
        if self.ignored() {
            return false;
        }
        let delta = PointDelta::from(delta);
        let touchpad = self.device_type(device) == Some(InputDeviceType::Touchpad);
        if touchpad {
            self.last_device = Some(device);
            if delta.is_null() {
                // clicking stops scrolling, the click has to be known first
                self.poll_evdev();
            }
        }
        if !touchpad || !one_axis_per_event {
            return self.axis_event(device, delta, one_axis_per_event);
        }

        let merge = self.axes.entry(device).or_default();
        let step = if delta.is_null() {
            merge.scrolling = false;
            match merge.held.take() {
                Some(held) => AxisStep::Split(held, delta),
                None => AxisStep::Process(delta),
            }
        } else if !merge.scrolling {
            merge.scrolling = true;
            AxisStep::Process(delta)
        } else {
            match merge.held.take() {
                None => {
                    merge.held = Some(delta);
                    AxisStep::Hold(merge.last_block)
                }
                Some(held) if same_axis(&held, &delta) => AxisStep::Split(held, delta),
                Some(held) => AxisStep::Process(held + delta),
            }
        };

        match step {
            AxisStep::Process(delta) => self.axis_event(device, delta, true),
            AxisStep::Split(first, second) => {
                self.axis_event(device, first, true);
                self.axis_event(device, second, true)
            }
            AxisStep::Hold(block) => {
                trace!(%device, block, "holding single axis event");
                block
            }
        }
    }

    fn axis_event(&mut self, device: DeviceId, delta: PointDelta, one_axis_per_event: bool) -> bool {
        let block = self.backend.handle_event(
            device,
            &InputEvent::PointerAxis {
                delta,
                one_axis_per_event,
            },
        );
        self.axes.entry(device).or_default().last_block = block;
        block
    }

    pub fn pointer_button(&mut self, device: DeviceId, scan_code: u16, pressed: bool) -> bool {
        if self.ignored() {
            return false;
        }
        let Some(button) = MouseButton::from_scan_code(scan_code) else {
            debug!(scan_code, "unknown mouse button");
            return false;
        };
        if self.device_type(device) == Some(InputDeviceType::Touchpad) {
            self.last_device = Some(device);
            self.poll_evdev();
        }
        self.backend
            .handle_event(device, &InputEvent::PointerButton { button, pressed })
    }

    /// Moves the pointer back when the motion is blocked
    pub fn pointer_motion(&mut self, device: DeviceId, delta: PointDelta) -> bool {
        if self.ignored() {
            return false;
        }
        let block = self.backend.handle_event(device, &InputEvent::PointerMotion { delta });
        let pointer = self.backend.ctx().pointer.clone();
        if block {
            if let Some(position) = self.previous_pointer_position {
                pointer.set_global_pointer_position(position);
            }
        } else {
            self.previous_pointer_position = pointer.global_pointer_position();
        }
        block
    }

    fn gesture(&mut self, device: Option<DeviceId>, phase: GesturePhase, triggers: TriggerType) -> bool {
        if phase == GesturePhase::Begin {
            if let Some(device) = device {
                self.last_device = Some(device);
            }
        }
        let Some(device) = device.or(self.last_device) else {
            return false;
        };
        self.backend.handle_event(
            device,
            &InputEvent::TouchpadGesture {
                phase,
                triggers,
                fingers: self.fingers,
            },
        )
    }

    fn end_phase(cancelled: bool) -> GesturePhase {
        if cancelled {
            GesturePhase::Cancel
        } else {
            GesturePhase::End
        }
    }

    pub fn touchpad_hold_begin(&mut self, device: DeviceId, fingers: u8) -> bool {
        if self.ignored() {
            return false;
        }
        self.fingers = fingers;
        self.poll_evdev();
        self.gesture_blocked = self.gesture(Some(device), GesturePhase::Begin, TriggerType::PRESS);
        self.gesture_blocked
    }

    /// Returns the decision of the matching begin
    pub fn touchpad_hold_end(&mut self, device: Option<DeviceId>, cancelled: bool) -> bool {
        if self.ignored() {
            return false;
        }
        self.poll_evdev();
        self.gesture(device, Self::end_phase(cancelled), TriggerType::PRESS);
        self.gesture_blocked
    }

    pub fn touchpad_pinch_begin(&mut self, device: DeviceId, fingers: u8) -> bool {
        if self.ignored() {
            return false;
        }
        self.fingers = fingers;
        self.gesture_blocked = self.gesture(Some(device), GesturePhase::Begin, TriggerType::PINCH_ROTATE);
        self.gesture_blocked
    }

    pub fn touchpad_pinch_update(&mut self, device: Option<DeviceId>, scale: f64, angle_delta: f64) -> bool {
        if self.ignored() {
            return false;
        }
        let Some(device) = device.or(self.last_device) else {
            return false;
        };
        let block = self
            .backend
            .handle_event(device, &InputEvent::TouchpadPinch { scale, angle_delta });
        if self.gesture_blocked && !block {
            debug!(fingers = self.fingers, "releasing pinch to the compositor");
            self.backend.ctx().emitter.touchpad_pinch_begin(self.fingers);
        }
        self.gesture_blocked = block;
        block
    }

    pub fn touchpad_pinch_end(&mut self, device: Option<DeviceId>, cancelled: bool) -> bool {
        if self.ignored() {
            return false;
        }
        self.gesture(device, Self::end_phase(cancelled), TriggerType::PINCH_ROTATE)
    }

    pub fn touchpad_swipe_begin(&mut self, device: DeviceId, fingers: u8) -> bool {
        if self.ignored() {
            return false;
        }
        self.fingers = fingers;
        self.gesture_blocked = self.gesture(Some(device), GesturePhase::Begin, TriggerType::STROKE_SWIPE);
        self.gesture_blocked
    }

    pub fn touchpad_swipe_update(&mut self, device: Option<DeviceId>, delta: PointDelta) -> bool {
        if self.ignored() {
            return false;
        }
        let Some(device) = device.or(self.last_device) else {
            return false;
        };
        let block = self.backend.handle_event(device, &InputEvent::TouchpadSwipe { delta });
        if self.gesture_blocked && !block {
            debug!(fingers = self.fingers, "releasing swipe to the compositor");
            self.backend.ctx().emitter.touchpad_swipe_begin(self.fingers);
        }
        self.gesture_blocked = block;
        block
    }

    pub fn touchpad_swipe_end(&mut self, device: Option<DeviceId>, cancelled: bool) -> bool {
        if self.ignored() {
            return false;
        }
        self.gesture(device, Self::end_phase(cancelled), TriggerType::STROKE_SWIPE)
    }

    /// Positions are in millimeters
    pub fn touchscreen_touch_down(&mut self, device: DeviceId, id: i32, position: Point) -> bool {
        if self.ignored() {
            return false;
        }
        let now = self.backend.ctx().clock.now();
        let Some(input_device) = self.backend.device_mut(device) else {
            return false;
        };
        if !input_device.touch_down(id, position, position, 0, now) {
            return false;
        }
        self.backend.handle_event(device, &InputEvent::TouchDown { id, position })
    }

    pub fn touchscreen_touch_motion(&mut self, device: DeviceId, id: i32, position: Point) -> bool {
        if self.ignored() {
            return false;
        }
        let Some(position_delta) = self
            .backend
            .device_mut(device)
            .and_then(|input_device| input_device.touch_motion(id, position, position))
        else {
            return false;
        };
        self.backend
            .handle_event(device, &InputEvent::TouchChanged { id, position_delta })
    }

    pub fn touchscreen_touch_up(&mut self, device: DeviceId, id: i32) -> bool {
        if self.ignored() {
            return false;
        }
        if !self
            .backend
            .device_mut(device)
            .is_some_and(|input_device| input_device.touch_up(id))
        {
            return false;
        }
        self.backend.handle_event(device, &InputEvent::TouchUp { id })
    }

    pub fn touchscreen_touch_cancel(&mut self, device: DeviceId) -> bool {
        if self.ignored() {
            return false;
        }
        let Some(input_device) = self.backend.device_mut(device) else {
            return false;
        };
        input_device.touch_cancel();
        self.backend.handle_event(device, &InputEvent::TouchCancel)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.backend.next_deadline()
    }

    pub fn dispatch_timers(&mut self) {
        self.backend.dispatch_timers();
    }
}
