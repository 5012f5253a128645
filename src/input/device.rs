//! Input devices and their state
//!
//! Every device keeps two views of itself: the physical state observed from
//! the hardware and the virtual state implied by input the engine emitted.

use crate::context::InputEmitter;
use crate::geometry::Point;
use crate::input::keys::{modifiers_for_keys, KeyboardModifiers, KeySet};
use crate::timer::Timer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Maximum simultaneous contacts tracked per device
pub const MAX_TOUCH_POINTS: usize = 10;

const TOUCHSCREEN_SIMULATED_TAP_DURATION: Duration = Duration::from_millis(10);

/// Unique identifier for devices, never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DeviceId(NonZeroU64);

static DEVICE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

impl DeviceId {
    /// Generate a new unique device ID
    pub fn next() -> Self {
        let id = DEVICE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        DeviceId(NonZeroU64::MIN.saturating_add(id))
    }

    /// Returns None if the value is zero
    pub fn from_raw(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(DeviceId)
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDeviceType {
    Keyboard,
    Mouse,
    Touchpad,
    Touchscreen,
}

/// Tunable device properties
///
/// Every field is optional so that rules can be layered on top of each
/// other. Getters fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputDeviceProperties {
    pub grab: Option<bool>,
    pub ignore: Option<bool>,
    /// Whether the evdev decoder should read this device
    pub handle_evdev: Option<bool>,
    pub multi_touch: Option<bool>,
    /// Size in device units
    pub size: Option<Point>,
    pub finger_pressure: Option<u32>,
    pub thumb_pressure: Option<u32>,
    pub palm_pressure: Option<u32>,
    /// Milliseconds
    pub mouse_motion_timeout: Option<u64>,
    /// Milliseconds
    pub mouse_press_timeout: Option<u64>,
    pub mouse_unblock_buttons_on_timeout: Option<bool>,
    pub button_pad: Option<bool>,
    /// Milliseconds
    pub touchpad_click_timeout: Option<u64>,
    /// Swap the two- and three-finger tap buttons
    pub lmr_tap_button_map: Option<bool>,
}

macro_rules! merge_fields {
    ($self:ident, $other:ident, $($field:ident),* $(,)?) => {
        $(
            if $other.$field.is_some() {
                $self.$field = $other.$field;
            }
        )*
    };
}

impl InputDeviceProperties {
    /// Overwrite every field set in `other`
    pub fn apply(&mut self, other: &InputDeviceProperties) {
        merge_fields!(
            self,
            other,
            grab,
            ignore,
            handle_evdev,
            multi_touch,
            size,
            finger_pressure,
            thumb_pressure,
            palm_pressure,
            mouse_motion_timeout,
            mouse_press_timeout,
            mouse_unblock_buttons_on_timeout,
            button_pad,
            touchpad_click_timeout,
            lmr_tap_button_map,
        );
    }

    pub fn grab(&self) -> bool {
        self.grab.unwrap_or(false)
    }

    pub fn ignore(&self) -> bool {
        self.ignore.unwrap_or(false)
    }

    pub fn handle_evdev(&self) -> bool {
        self.handle_evdev.unwrap_or(true)
    }

    pub fn multi_touch(&self) -> bool {
        self.multi_touch.unwrap_or(false)
    }

    pub fn size(&self) -> Option<Point> {
        self.size
    }

    pub fn finger_pressure(&self) -> u32 {
        self.finger_pressure.unwrap_or(0)
    }

    pub fn thumb_pressure(&self) -> u32 {
        self.thumb_pressure.unwrap_or(u32::MAX)
    }

    pub fn palm_pressure(&self) -> u32 {
        self.palm_pressure.unwrap_or(u32::MAX)
    }

    pub fn mouse_motion_timeout(&self) -> Duration {
        Duration::from_millis(self.mouse_motion_timeout.unwrap_or(200))
    }

    pub fn mouse_press_timeout(&self) -> Duration {
        Duration::from_millis(self.mouse_press_timeout.unwrap_or(50))
    }

    pub fn mouse_unblock_buttons_on_timeout(&self) -> bool {
        self.mouse_unblock_buttons_on_timeout.unwrap_or(true)
    }

    pub fn button_pad(&self) -> bool {
        self.button_pad.unwrap_or(false)
    }

    pub fn touchpad_click_timeout(&self) -> Duration {
        Duration::from_millis(self.touchpad_click_timeout.unwrap_or(200))
    }

    pub fn lmr_tap_button_map(&self) -> bool {
        self.lmr_tap_button_map.unwrap_or(false)
    }
}

/// Which devices a rule applies to. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceRuleCondition {
    pub name: Option<String>,
    pub device_type: Option<InputDeviceType>,
}

impl DeviceRuleCondition {
    pub fn matches(&self, device_type: InputDeviceType, name: &str) -> bool {
        self.name.as_deref().map_or(true, |n| n == name)
            && self.device_type.map_or(true, |t| t == device_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputDeviceRule {
    pub condition: Option<DeviceRuleCondition>,
    pub properties: InputDeviceProperties,
}

impl InputDeviceRule {
    pub fn matches(&self, device_type: InputDeviceType, name: &str) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.matches(device_type, name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchPointType {
    #[default]
    None,
    Finger,
    Thumb,
    Palm,
}

/// One slot of the touch-contact table
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchPoint {
    /// Active and classified as a finger or thumb
    pub valid: bool,
    /// Raw presence regardless of classification
    pub active: bool,
    pub kind: TouchPointType,
    pub id: i32,
    /// Fraction of the device size
    pub position: Point,
    pub initial_position: Point,
    /// Device units
    pub raw_position: Point,
    pub raw_initial_position: Point,
    pub pressure: u32,
    pub down_timestamp: Option<Instant>,
}

/// Pressed keys and touch contacts
#[derive(Debug, Clone, Default)]
pub struct InputDeviceState {
    keys: KeySet,
    touch_points: [TouchPoint; MAX_TOUCH_POINTS],
}

impl InputDeviceState {
    pub fn pressed_keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn is_key_pressed(&self, key: u16) -> bool {
        self.keys.contains(&key)
    }

    pub fn set_key_state(&mut self, key: u16, pressed: bool) {
        if pressed {
            self.keys.insert(key);
        } else {
            self.keys.remove(&key);
        }
    }

    pub fn active_modifiers(&self) -> KeyboardModifiers {
        modifiers_for_keys(&self.keys)
    }

    /// Every slot, including inactive ones. Slot indices are stable.
    pub fn touch_points(&self) -> &[TouchPoint] {
        &self.touch_points
    }

    pub fn find_touch_point(&self, id: i32) -> Option<&TouchPoint> {
        self.touch_points.iter().find(|p| p.active && p.id == id)
    }

    fn find_touch_point_mut(&mut self, id: i32) -> Option<&mut TouchPoint> {
        self.touch_points.iter_mut().find(|p| p.active && p.id == id)
    }

    /// Valid contacts ordered by the time they touched down
    pub fn valid_touch_points(&self) -> Vec<&TouchPoint> {
        let mut points: Vec<_> = self.touch_points.iter().filter(|p| p.valid).collect();
        points.sort_by_key(|p| p.down_timestamp);
        points
    }

    pub fn active_touch_points(&self) -> impl Iterator<Item = &TouchPoint> {
        self.touch_points.iter().filter(|p| p.active)
    }
}

pub struct InputDevice {
    pub id: DeviceId,
    pub device_type: InputDeviceType,
    pub name: String,
    /// Kernel name, such as `event5`
    pub sys_name: String,
    pub properties: InputDeviceProperties,
    physical: InputDeviceState,
    virtual_state: InputDeviceState,
    touchscreen_tap_timer: Timer,
    touchscreen_tap_points: Vec<(i32, Point)>,
}

impl InputDevice {
    pub fn new(device_type: InputDeviceType, name: &str, sys_name: &str) -> Self {
        Self {
            id: DeviceId::next(),
            device_type,
            name: name.to_string(),
            sys_name: sys_name.to_string(),
            properties: InputDeviceProperties::default(),
            physical: InputDeviceState::default(),
            virtual_state: InputDeviceState::default(),
            touchscreen_tap_timer: Timer::new(),
            touchscreen_tap_points: Vec::new(),
        }
    }

    pub fn physical_state(&self) -> &InputDeviceState {
        &self.physical
    }

    pub fn virtual_state(&self) -> &InputDeviceState {
        &self.virtual_state
    }

    /// Key observed from the hardware
    pub fn keyboard_key(&mut self, key: u16, pressed: bool) {
        self.physical.set_key_state(key, pressed);
    }

    /// Key the engine emitted or let through
    pub fn virtual_keyboard_key(&mut self, key: u16, pressed: bool) {
        self.virtual_state.set_key_state(key, pressed);
    }

    /// Release every key the receiving environment believes is pressed.
    /// Returns the released keys so they can be restored later.
    pub fn release_virtual_keys(&mut self, emitter: &dyn InputEmitter) -> KeySet {
        let keys = std::mem::take(&mut self.virtual_state.keys);
        for key in keys.iter().rev() {
            emitter.keyboard_key(*key, false);
        }
        keys
    }

    /// Press keys released by [`InputDevice::release_virtual_keys`] that are still physically held
    pub fn restore_virtual_keys(&mut self, keys: &KeySet, emitter: &dyn InputEmitter) {
        for key in keys {
            if self.physical.is_key_pressed(*key) {
                emitter.keyboard_key(*key, true);
                self.virtual_state.set_key_state(*key, true);
            }
        }
    }

    /// Returns false if every slot is taken or `id` is already down
    pub fn touch_down(
        &mut self,
        id: i32,
        position: Point,
        raw_position: Point,
        pressure: u32,
        now: Instant,
    ) -> bool {
        if self.physical.touch_points.iter().any(|p| p.active && p.id == id) {
            debug!(device = %self.name, id, "contact already down, ignoring");
            return false;
        }
        let Some(slot) = self.physical.touch_points.iter().position(|p| !p.active) else {
            warn!(device = %self.name, id, "touch point table full, ignoring contact");
            return false;
        };

        trace!(device = %self.name, id, slot, ?position, pressure, "touch down");
        self.physical.touch_points[slot] = TouchPoint {
            valid: true,
            active: true,
            kind: TouchPointType::Finger,
            id,
            position,
            initial_position: position,
            raw_position,
            raw_initial_position: raw_position,
            pressure,
            down_timestamp: Some(now),
        };
        self.update_point_state(slot);
        true
    }

    /// Returns the position delta, or None for an unknown contact
    pub fn touch_motion(&mut self, id: i32, position: Point, raw_position: Point) -> Option<Point> {
        let point = self.physical.find_touch_point_mut(id)?;
        let delta = position - point.position;
        point.position = position;
        point.raw_position = raw_position;
        Some(delta)
    }

    pub fn touch_pressure(&mut self, id: i32, pressure: u32) -> bool {
        let Some(slot) = self
            .physical
            .touch_points
            .iter()
            .position(|p| p.active && p.id == id)
        else {
            return false;
        };
        self.physical.touch_points[slot].pressure = pressure;
        self.update_point_state(slot);
        true
    }

    pub fn touch_up(&mut self, id: i32) -> bool {
        let Some(point) = self.physical.find_touch_point_mut(id) else {
            return false;
        };
        trace!(id, "touch up");
        point.active = false;
        point.valid = false;
        true
    }

    pub fn touch_cancel(&mut self) {
        for point in &mut self.physical.touch_points {
            point.active = false;
            point.valid = false;
        }
    }

    fn update_point_state(&mut self, slot: usize) {
        let finger = self.properties.finger_pressure();
        let thumb = self.properties.thumb_pressure();
        let palm = self.properties.palm_pressure();
        let point = &mut self.physical.touch_points[slot];
        point.kind = if point.pressure >= palm {
            TouchPointType::Palm
        } else if point.pressure >= thumb {
            TouchPointType::Thumb
        } else if point.pressure >= finger {
            TouchPointType::Finger
        } else {
            TouchPointType::None
        };
        point.valid = matches!(point.kind, TouchPointType::Finger | TouchPointType::Thumb);
    }

    /// Emit a short synthetic tap. Ignored while a tap is in progress or
    /// the screen is being touched.
    pub fn touchscreen_tap(&mut self, points: &[Point], emitter: &dyn InputEmitter, now: Instant) {
        if self.touchscreen_tap_timer.is_active() || !self.physical.valid_touch_points().is_empty() {
            return;
        }

        debug!(device = %self.name, points = points.len(), "simulating touchscreen tap");
        self.touchscreen_tap_points = points
            .iter()
            .enumerate()
            .map(|(i, p)| (i as i32, *p))
            .collect();
        for (id, position) in &self.touchscreen_tap_points {
            emitter.touchscreen_touch_down(*id, *position);
        }
        self.touchscreen_tap_timer.start(now, TOUCHSCREEN_SIMULATED_TAP_DURATION);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.touchscreen_tap_timer.deadline()
    }

    pub fn dispatch_timers(&mut self, emitter: &dyn InputEmitter, now: Instant) {
        if self.touchscreen_tap_timer.poll(now) {
            for (id, _) in self.touchscreen_tap_points.drain(..) {
                emitter.touchscreen_touch_up(id);
            }
        }
    }
}

impl fmt::Debug for InputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDevice")
            .field("id", &self.id)
            .field("type", &self.device_type)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touchpad() -> InputDevice {
        InputDevice::new(InputDeviceType::Touchpad, "Test Touchpad", "event3")
    }

    #[test]
    fn test_properties_apply_overrides_set_fields_only() {
        let mut base = InputDeviceProperties {
            grab: Some(true),
            finger_pressure: Some(10),
            ..Default::default()
        };
        base.apply(&InputDeviceProperties {
            finger_pressure: Some(20),
            ..Default::default()
        });
        assert!(base.grab());
        assert_eq!(base.finger_pressure(), 20);
        assert_eq!(base.thumb_pressure(), u32::MAX);
        assert_eq!(base.mouse_press_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_touch_slots_are_reused() {
        let mut device = touchpad();
        let now = Instant::now();
        assert!(device.touch_down(0, Point::default(), Point::default(), 0, now));
        assert!(device.touch_down(1, Point::default(), Point::default(), 0, now));
        assert!(device.touch_up(0));
        assert!(device.touch_down(2, Point::default(), Point::default(), 0, now));
        assert_eq!(device.physical_state().touch_points()[0].id, 2);
        assert_eq!(device.physical_state().active_touch_points().count(), 2);
    }

    #[test]
    fn test_duplicate_contact_id_is_rejected() {
        let mut device = touchpad();
        let now = Instant::now();
        assert!(device.touch_down(3, Point::new(1.0, 1.0), Point::default(), 0, now));
        assert!(!device.touch_down(3, Point::new(2.0, 2.0), Point::default(), 0, now));
        assert_eq!(device.physical_state().active_touch_points().count(), 1);
        assert_eq!(
            device.physical_state().find_touch_point(3).map(|p| p.position),
            Some(Point::new(1.0, 1.0))
        );

        assert!(device.touch_up(3));
        assert!(device.touch_down(3, Point::new(2.0, 2.0), Point::default(), 0, now));
    }

    #[test]
    fn test_touch_table_is_bounded() {
        let mut device = touchpad();
        let now = Instant::now();
        for id in 0..MAX_TOUCH_POINTS as i32 {
            assert!(device.touch_down(id, Point::default(), Point::default(), 0, now));
        }
        assert!(!device.touch_down(99, Point::default(), Point::default(), 0, now));
    }

    #[test]
    fn test_pressure_classification() {
        let mut device = touchpad();
        device.properties.finger_pressure = Some(10);
        device.properties.thumb_pressure = Some(50);
        device.properties.palm_pressure = Some(100);
        let now = Instant::now();
        device.touch_down(0, Point::default(), Point::default(), 5, now);
        let kind = |device: &InputDevice| {
            device
                .physical_state()
                .find_touch_point(0)
                .map(|p| (p.kind, p.valid))
        };

        assert_eq!(kind(&device), Some((TouchPointType::None, false)));
        device.touch_pressure(0, 20);
        assert_eq!(kind(&device), Some((TouchPointType::Finger, true)));
        device.touch_pressure(0, 60);
        assert_eq!(kind(&device), Some((TouchPointType::Thumb, true)));
        device.touch_pressure(0, 100);
        assert_eq!(kind(&device), Some((TouchPointType::Palm, false)));
    }

    #[test]
    fn test_valid_points_sorted_by_down_time() {
        let mut device = touchpad();
        let now = Instant::now();
        device.touch_down(0, Point::default(), Point::default(), 0, now + Duration::from_millis(5));
        device.touch_down(1, Point::default(), Point::default(), 0, now);
        let ids: Vec<_> = device
            .physical_state()
            .valid_touch_points()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn test_unknown_touch_id_is_ignored() {
        let mut device = touchpad();
        assert!(!device.touch_up(7));
        assert_eq!(device.touch_motion(7, Point::default(), Point::default()), None);
        assert!(!device.touch_pressure(7, 1));
    }

    #[test]
    fn test_rule_condition() {
        let rule = InputDeviceRule {
            condition: Some(DeviceRuleCondition {
                name: None,
                device_type: Some(InputDeviceType::Touchpad),
            }),
            properties: InputDeviceProperties::default(),
        };
        assert!(rule.matches(InputDeviceType::Touchpad, "anything"));
        assert!(!rule.matches(InputDeviceType::Mouse, "anything"));
        assert!(InputDeviceRule::default().matches(InputDeviceType::Keyboard, "kbd"));
    }
}
