//! Raw evdev decoding for touchpads and touchscreens
//!
//! libinput does not expose individual contacts of a touchpad, so the
//! device node is read alongside it. [`EvdevDecoder`] keeps one state per
//! multi-touch slot, applies the differences to the [`InputDevice`] on
//! every `SYN_REPORT` and returns the resulting touch events. Contacts are
//! identified by their slot index.

use crate::context::EngineContext;
use crate::error::{TriggerError, TriggerResult};
use crate::geometry::Point;
use crate::input::keys::codes;
use crate::input::{InputDevice, InputDeviceProperties, InputDeviceType, InputEvent, MAX_TOUCH_POINTS};
use crate::variables::FINGERS;
use evdev::{AbsoluteAxisType, InputEventKind, PropType, Synchronization};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, trace};

/// Range of an absolute axis as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
    /// Units per millimeter, 0 if unknown
    pub resolution: i32,
}

impl AxisRange {
    pub const fn new(min: i32, max: i32, resolution: i32) -> Self {
        Self { min, max, resolution }
    }

    /// Fraction of the range, 0 to 1
    fn fraction(&self, value: i32) -> f64 {
        let span = (self.max - self.min) as f64;
        if span <= 0.0 {
            return 0.0;
        }
        (value - self.min) as f64 / span
    }

    /// Millimeters from the start of the range, or raw units without a resolution
    fn millimeters(&self, value: i32) -> f64 {
        let offset = (value - self.min) as f64;
        if self.resolution > 0 {
            offset / self.resolution as f64
        } else {
            offset
        }
    }

    fn length(&self) -> f64 {
        let span = (self.max - self.min) as f64;
        if self.resolution > 0 {
            span / self.resolution as f64
        } else {
            span
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Slot {
    active: bool,
    x: i32,
    y: i32,
    pressure: u32,
}

/// Source of raw events for one device node
pub trait EvdevSource {
    /// Every event that arrived since the last call
    fn fetch(&mut self) -> TriggerResult<Vec<evdev::InputEvent>>;
}

impl EvdevSource for VecDeque<evdev::InputEvent> {
    fn fetch(&mut self) -> TriggerResult<Vec<evdev::InputEvent>> {
        Ok(self.drain(..).collect())
    }
}

impl EvdevSource for evdev::Device {
    fn fetch(&mut self) -> TriggerResult<Vec<evdev::InputEvent>> {
        match self.fetch_events() {
            Ok(events) => Ok(events.collect()),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug)]
pub struct EvdevDecoder {
    x: AxisRange,
    y: AxisRange,
    slots: [Slot; MAX_TOUCH_POINTS],
    previous: [Slot; MAX_TOUCH_POINTS],
    /// None while the kernel addresses a slot beyond the table
    current_slot: Option<usize>,
    finger_code: Option<u16>,
    clicks: Vec<bool>,
}

impl EvdevDecoder {
    pub fn new(x: AxisRange, y: AxisRange) -> Self {
        Self {
            x,
            y,
            slots: [Slot::default(); MAX_TOUCH_POINTS],
            previous: [Slot::default(); MAX_TOUCH_POINTS],
            current_slot: Some(0),
            finger_code: None,
            clicks: Vec::new(),
        }
    }

    /// Physical size in millimeters, or raw units without a resolution
    pub fn size(&self) -> Point {
        Point::new(self.x.length(), self.y.length())
    }

    /// Finger count reported by the last `BTN_TOOL_*` key
    pub fn fingers(&self) -> u8 {
        match self.finger_code {
            Some(codes::BTN_TOOL_FINGER) => 1,
            Some(codes::BTN_TOOL_DOUBLETAP) => 2,
            Some(codes::BTN_TOOL_TRIPLETAP) => 3,
            Some(codes::BTN_TOOL_QUADTAP) => 4,
            Some(codes::BTN_TOOL_QUINTTAP) => 5,
            _ => 0,
        }
    }

    fn position(&self, device_type: InputDeviceType, slot: &Slot) -> Point {
        match device_type {
            InputDeviceType::Touchscreen => Point::new(self.x.millimeters(slot.x), self.y.millimeters(slot.y)),
            _ => Point::new(self.x.fraction(slot.x), self.y.fraction(slot.y)),
        }
    }

    /// Feed one raw event. Touch events are only produced on `SYN_REPORT`.
    pub fn process(
        &mut self,
        event: &evdev::InputEvent,
        device: &mut InputDevice,
        ctx: &EngineContext,
    ) -> Vec<InputEvent> {
        let multi_touch = device.properties.multi_touch();
        let value = event.value();
        match event.kind() {
            InputEventKind::Synchronization(Synchronization::SYN_REPORT) => {
                ctx.variables.set(FINGERS, Some(self.fingers().into()));
                return self.report(device, ctx.clock.now());
            }
            InputEventKind::Key(key) => {
                let code = key.code();
                match code {
                    codes::BTN_TOOL_FINGER
                    | codes::BTN_TOOL_DOUBLETAP
                    | codes::BTN_TOOL_TRIPLETAP
                    | codes::BTN_TOOL_QUADTAP
                    | codes::BTN_TOOL_QUINTTAP => {
                        if value == 1 {
                            self.finger_code = Some(code);
                        } else if value == 0 && self.finger_code == Some(code) {
                            self.finger_code = None;
                        }
                    }
                    codes::BTN_LEFT | codes::BTN_MIDDLE | codes::BTN_RIGHT if device.properties.button_pad() => {
                        self.clicks.push(value != 0);
                    }
                    _ if code == evdev::Key::BTN_TOUCH.code() && !multi_touch => {
                        self.slots[0].active = value != 0;
                    }
                    _ => {}
                }
            }
            InputEventKind::AbsAxis(axis) => self.absolute(axis, value, multi_touch),
            _ => {}
        }
        Vec::new()
    }

    fn absolute(&mut self, axis: AbsoluteAxisType, value: i32, multi_touch: bool) {
        if axis == AbsoluteAxisType::ABS_MT_SLOT {
            self.current_slot = usize::try_from(value).ok().filter(|slot| *slot < MAX_TOUCH_POINTS);
            if self.current_slot.is_none() {
                trace!(value, "slot out of range");
            }
            return;
        }

        let index = if multi_touch { self.current_slot } else { Some(0) };
        let Some(slot) = index.map(|index| &mut self.slots[index]) else {
            return;
        };
        match axis {
            AbsoluteAxisType::ABS_MT_TRACKING_ID if multi_touch => slot.active = value != -1,
            AbsoluteAxisType::ABS_MT_POSITION_X if multi_touch => slot.x = value,
            AbsoluteAxisType::ABS_MT_POSITION_Y if multi_touch => slot.y = value,
            AbsoluteAxisType::ABS_MT_PRESSURE if multi_touch => slot.pressure = value.max(0) as u32,
            AbsoluteAxisType::ABS_X if !multi_touch => slot.x = value,
            AbsoluteAxisType::ABS_Y if !multi_touch => slot.y = value,
            AbsoluteAxisType::ABS_PRESSURE if !multi_touch => slot.pressure = value.max(0) as u32,
            _ => {}
        }
    }

    fn report(&mut self, device: &mut InputDevice, now: Instant) -> Vec<InputEvent> {
        let mut events = Vec::new();
        for index in 0..MAX_TOUCH_POINTS {
            let (before, after) = (self.previous[index], self.slots[index]);
            let id = index as i32;
            let raw = Point::new(after.x as f64, after.y as f64);
            let position = self.position(device.device_type, &after);
            match (before.active, after.active) {
                (false, true) => {
                    if device.touch_down(id, position, raw, after.pressure, now) {
                        events.push(InputEvent::TouchDown { id, position });
                    }
                }
                (true, true) => {
                    let mut changed = None;
                    if before.x != after.x || before.y != after.y {
                        changed = device.touch_motion(id, position, raw);
                    }
                    if before.pressure != after.pressure && device.touch_pressure(id, after.pressure) {
                        changed.get_or_insert(Point::default());
                    }
                    if let Some(position_delta) = changed {
                        events.push(InputEvent::TouchChanged { id, position_delta });
                    }
                }
                (true, false) => {
                    if device.touch_up(id) {
                        events.push(InputEvent::TouchUp { id });
                    }
                }
                (false, false) => {}
            }
        }
        self.previous = self.slots;

        events.extend(self.clicks.drain(..).map(|pressed| InputEvent::TouchpadClick { pressed }));
        events
    }
}

/// Open a device node and read the properties the decoder depends on
pub fn probe(path: impl AsRef<Path>) -> TriggerResult<(evdev::Device, EvdevDecoder, InputDeviceProperties)> {
    let path = path.as_ref();
    let device = evdev::Device::open(path)?;
    let axes = device
        .supported_absolute_axes()
        .ok_or_else(|| TriggerError::Device(format!("{} is not an absolute device", path.display())))?;
    let multi_touch = axes.contains(AbsoluteAxisType::ABS_MT_SLOT);
    let state = device.get_abs_state()?;

    let (x_axis, y_axis) = if multi_touch {
        (AbsoluteAxisType::ABS_MT_POSITION_X, AbsoluteAxisType::ABS_MT_POSITION_Y)
    } else {
        (AbsoluteAxisType::ABS_X, AbsoluteAxisType::ABS_Y)
    };
    let range = |axis: AbsoluteAxisType| {
        let info = &state[axis.0 as usize];
        AxisRange::new(info.minimum, info.maximum, info.resolution)
    };
    let (x, y) = (range(x_axis), range(y_axis));
    if x.max <= x.min || y.max <= y.min {
        return Err(TriggerError::Device(format!("{} has a size of 0", path.display())));
    }

    let decoder = EvdevDecoder::new(x, y);
    let properties = InputDeviceProperties {
        multi_touch: Some(multi_touch),
        size: Some(decoder.size()),
        button_pad: Some(device.properties().contains(PropType::BUTTONPAD)),
        ..Default::default()
    };
    debug!(
        path = %path.display(),
        name = device.name().unwrap_or_default(),
        multi_touch,
        size = ?properties.size,
        "probed evdev device"
    );
    Ok((device, decoder, properties))
}
