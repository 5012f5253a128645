//! Event routing
//!
//! [`InputBackend`] owns the devices and one handler per device class. Every
//! raw event goes through [`InputBackend::handle_event`], which updates the
//! device, publishes the per-event variables and asks the handlers in turn
//! whether to block it. The first handler that blocks wins.
//!
//! The handlers are built from a guarded copy of the engine context: any
//! input they emit sets the shared [`IgnoreFlag`] for the duration of the
//! write, and events arriving while it is set are passed through untouched.

pub mod evdev;
pub mod libinput;
mod recorder;

pub use self::libinput::LibinputBackend;
pub use self::recorder::STROKE_RECORD_TIMEOUT;

use self::recorder::StrokeRecorder;
use crate::config::{MotionSettings, Settings};
use crate::context::{EngineContext, IgnoreFlag};
use crate::handlers::{
    InputEventHandler, KeyboardTriggerHandler, MouseTriggerHandler, PointerTriggerHandler,
    TouchpadTriggerHandler, TouchscreenTriggerHandler,
};
use crate::input::{
    DeviceId, InputDevice, InputDeviceProperties, InputDeviceRule, InputDeviceType, InputEvent,
    KeyboardModifiers,
};
use crate::timer::earliest;
use crate::trigger::{Stroke, Trigger};
use crate::variables::{DEVICE_NAME, KEYBOARD_MODIFIERS, POINTER_POSITION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, trace};

/// Handler a set of triggers is installed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Keyboard,
    Mouse,
    /// Hover triggers, fed by every pointing device
    Pointer,
    Touchpad,
    Touchscreen,
}

type TriggerFactory = Box<dyn Fn() -> Vec<Trigger>>;

pub struct InputBackend {
    ctx: EngineContext,
    ignore: IgnoreFlag,

    devices: Vec<InputDevice>,
    /// Properties the device was added with, before rules are layered on top
    detected_properties: HashMap<DeviceId, InputDeviceProperties>,
    device_rules: Vec<InputDeviceRule>,
    custom_properties: HashMap<String, InputDeviceProperties>,
    motion_settings: MotionSettings,

    keyboard: KeyboardTriggerHandler,
    mouse: MouseTriggerHandler,
    pointer: PointerTriggerHandler,
    touchpads: Vec<TouchpadTriggerHandler>,
    touchscreens: Vec<TouchscreenTriggerHandler>,
    touchpad_triggers: Option<TriggerFactory>,
    touchscreen_triggers: Option<TriggerFactory>,

    recorder: StrokeRecorder,
}

impl fmt::Debug for InputBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBackend")
            .field("devices", &self.devices)
            .field("device_rules", &self.device_rules.len())
            .field("touchpads", &self.touchpads.len())
            .field("touchscreens", &self.touchscreens.len())
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}

/// Defaults, then the detected properties, then matching rules from the
/// lowest to the highest priority, then properties set for the exact name
fn resolve_properties(
    device_type: InputDeviceType,
    name: &str,
    detected: Option<&InputDeviceProperties>,
    rules: &[InputDeviceRule],
    custom: &HashMap<String, InputDeviceProperties>,
) -> InputDeviceProperties {
    let mut properties = detected.cloned().unwrap_or_default();
    for rule in rules.iter().rev().filter(|rule| rule.matches(device_type, name)) {
        properties.apply(&rule.properties);
    }
    if let Some(custom) = custom.get(name) {
        properties.apply(custom);
    }
    properties
}

impl InputBackend {
    pub fn new(ctx: EngineContext) -> Self {
        let ignore = IgnoreFlag::new();
        let ctx = ctx.guarded(&ignore);
        let motion_settings = MotionSettings::default();

        let mut mouse = MouseTriggerHandler::new(ctx.clone());
        motion_settings.apply(mouse.motion_mut());

        Self {
            keyboard: KeyboardTriggerHandler::new(ctx.clone()),
            mouse,
            pointer: PointerTriggerHandler::new(ctx.clone()),
            touchpads: Vec::new(),
            touchscreens: Vec::new(),
            touchpad_triggers: None,
            touchscreen_triggers: None,
            devices: Vec::new(),
            detected_properties: HashMap::new(),
            device_rules: Vec::new(),
            custom_properties: HashMap::new(),
            motion_settings,
            recorder: StrokeRecorder::default(),
            ignore,
            ctx,
        }
    }

    /// Context whose emitter sets the ignore flag while writing
    pub fn ctx(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn ignore_flag(&self) -> &IgnoreFlag {
        &self.ignore
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.device_rules = settings.device_rules.clone();
        self.custom_properties = settings.device_properties.clone();
        self.set_motion_settings(settings.motion.clone());
        self.reapply_properties();
    }

    pub fn set_device_rules(&mut self, rules: Vec<InputDeviceRule>) {
        self.device_rules = rules;
        self.reapply_properties();
    }

    pub fn set_custom_device_properties(&mut self, name: &str, properties: InputDeviceProperties) {
        self.custom_properties.insert(name.to_string(), properties);
        self.reapply_properties();
    }

    pub fn set_motion_settings(&mut self, settings: MotionSettings) {
        settings.apply(self.mouse.motion_mut());
        for handler in &mut self.touchpads {
            settings.apply(handler.multitouch_mut().motion_mut());
        }
        for handler in &mut self.touchscreens {
            settings.apply(handler.multitouch_mut().motion_mut());
        }
        self.motion_settings = settings;
    }

    /// Install triggers. Touchpads and touchscreens get their own copy per
    /// device, so the factory is kept for devices added later.
    pub fn set_triggers(&mut self, kind: HandlerKind, factory: impl Fn() -> Vec<Trigger> + 'static) {
        debug!(?kind, "setting triggers");
        match kind {
            HandlerKind::Keyboard => self.keyboard.triggers_mut().set_triggers(factory()),
            HandlerKind::Mouse => self.mouse.motion_mut().triggers_mut().set_triggers(factory()),
            HandlerKind::Pointer => self.pointer.triggers_mut().set_triggers(factory()),
            HandlerKind::Touchpad => {
                for handler in &mut self.touchpads {
                    handler.multitouch_mut().motion_mut().triggers_mut().set_triggers(factory());
                }
                self.touchpad_triggers = Some(Box::new(factory));
            }
            HandlerKind::Touchscreen => {
                for handler in &mut self.touchscreens {
                    handler.multitouch_mut().motion_mut().triggers_mut().set_triggers(factory());
                }
                self.touchscreen_triggers = Some(Box::new(factory));
            }
        }
    }

    /// The properties the device carries are treated as detected from the
    /// hardware. Rules and custom properties are layered on top.
    pub fn add_device(&mut self, mut device: InputDevice) -> DeviceId {
        let id = device.id;
        let detected = std::mem::take(&mut device.properties);
        device.properties = resolve_properties(
            device.device_type,
            &device.name,
            Some(&detected),
            &self.device_rules,
            &self.custom_properties,
        );
        info!(
            name = %device.name,
            sys_name = %device.sys_name,
            device_type = ?device.device_type,
            ignore = device.properties.ignore(),
            "device added"
        );

        match device.device_type {
            InputDeviceType::Touchpad => {
                let mut handler = TouchpadTriggerHandler::new(self.ctx.clone(), id);
                self.motion_settings.apply(handler.multitouch_mut().motion_mut());
                if let Some(factory) = &self.touchpad_triggers {
                    handler.multitouch_mut().motion_mut().triggers_mut().set_triggers(factory());
                }
                self.touchpads.push(handler);
            }
            InputDeviceType::Touchscreen => {
                let mut handler = TouchscreenTriggerHandler::new(self.ctx.clone(), id);
                self.motion_settings.apply(handler.multitouch_mut().motion_mut());
                if let Some(factory) = &self.touchscreen_triggers {
                    handler.multitouch_mut().motion_mut().triggers_mut().set_triggers(factory());
                }
                self.touchscreens.push(handler);
            }
            InputDeviceType::Keyboard | InputDeviceType::Mouse => {}
        }

        self.detected_properties.insert(id, detected);
        self.devices.push(device);
        id
    }

    pub fn remove_device(&mut self, id: DeviceId) -> Option<InputDevice> {
        let index = self.devices.iter().position(|device| device.id == id)?;
        let device = self.devices.remove(index);
        self.detected_properties.remove(&id);
        self.touchpads.retain(|handler| handler.device() != id);
        self.touchscreens.retain(|handler| handler.device() != id);
        info!(name = %device.name, "device removed");
        Some(device)
    }

    /// Merge newly detected hardware properties into a known device
    pub fn update_detected_properties(&mut self, id: DeviceId, properties: &InputDeviceProperties) {
        self.detected_properties.entry(id).or_default().apply(properties);
        self.reapply_properties();
    }

    pub fn device(&self, id: DeviceId) -> Option<&InputDevice> {
        self.devices.iter().find(|device| device.id == id)
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut InputDevice> {
        self.devices.iter_mut().find(|device| device.id == id)
    }

    pub fn devices(&self) -> &[InputDevice] {
        &self.devices
    }

    pub fn keyboard_handler(&self) -> &KeyboardTriggerHandler {
        &self.keyboard
    }

    pub fn mouse_handler(&self) -> &MouseTriggerHandler {
        &self.mouse
    }

    pub fn pointer_handler(&self) -> &PointerTriggerHandler {
        &self.pointer
    }

    pub fn touchpad_handler(&self, id: DeviceId) -> Option<&TouchpadTriggerHandler> {
        self.touchpads.iter().find(|handler| handler.device() == id)
    }

    pub fn touchscreen_handler(&self, id: DeviceId) -> Option<&TouchscreenTriggerHandler> {
        self.touchscreens.iter().find(|handler| handler.device() == id)
    }

    /// Redirect motion into a new stroke until the pointer rests for
    /// [`STROKE_RECORD_TIMEOUT`] or the touchpad gesture ends
    pub fn record_stroke(&mut self, callback: impl FnOnce(Stroke) + 'static) {
        self.recorder.start(Box::new(callback));
    }

    pub fn is_recording_stroke(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Release the keys the environment sees as pressed, recompute every
    /// device's properties, then press the keys that are still held
    fn reapply_properties(&mut self) {
        let _guard = self.ignore.hold();
        let emitter = self.ctx.emitter.clone();
        for device in &mut self.devices {
            let keys = device.release_virtual_keys(emitter.as_ref());
            device.properties = resolve_properties(
                device.device_type,
                &device.name,
                self.detected_properties.get(&device.id),
                &self.device_rules,
                &self.custom_properties,
            );
            device.restore_virtual_keys(&keys, emitter.as_ref());
        }
        debug!(devices = self.devices.len(), "device properties applied");
    }

    fn publish_variables(&self, device: &InputDevice) {
        let variables = &self.ctx.variables;
        if device.device_type != InputDeviceType::Keyboard {
            variables.set(DEVICE_NAME, Some(device.name.as_str().into()));
        }

        let modifiers = self
            .devices
            .iter()
            .filter(|device| device.device_type == InputDeviceType::Keyboard)
            .fold(KeyboardModifiers::empty(), |modifiers, device| {
                modifiers | device.physical_state().active_modifiers()
            });
        variables.set(KEYBOARD_MODIFIERS, Some(f64::from(modifiers.bits()).into()));
        variables.set(
            POINTER_POSITION,
            self.ctx.pointer.global_pointer_position().map(Into::into),
        );
    }

    /// Returns whether the event should be blocked
    #[profiling::function]
    pub fn handle_event(&mut self, id: DeviceId, event: &InputEvent) -> bool {
        if self.ignore.is_set() {
            trace!(event = event.name(), "ignoring event while emitting");
            return false;
        }
        let Some(index) = self.devices.iter().position(|device| device.id == id) else {
            debug!(?id, event = event.name(), "event from unknown device");
            return false;
        };
        if self.devices[index].properties.ignore() {
            return false;
        }

        if let InputEvent::KeyboardKey { key, pressed } = *event {
            self.devices[index].keyboard_key(key, pressed);
        }
        self.publish_variables(&self.devices[index]);

        let now = self.ctx.clock.now();
        let device = &self.devices[index];
        let block = match self.recorder.handle_event(device, event, now) {
            Some(block) => block,
            None => {
                let mut handlers: Vec<&mut dyn InputEventHandler> = vec![&mut self.keyboard, &mut self.mouse];
                handlers.extend(self.touchpads.iter_mut().map(|h| h as &mut dyn InputEventHandler));
                handlers.extend(self.touchscreens.iter_mut().map(|h| h as &mut dyn InputEventHandler));
                handlers.push(&mut self.pointer);
                handlers.into_iter().any(|handler| handler.handle_event(device, event))
            }
        };
        trace!(event = event.name(), device = %device.name, block, "event handled");

        if let InputEvent::KeyboardKey { key, pressed } = *event {
            if !block {
                self.devices[index].virtual_keyboard_key(key, pressed);
            }
        }
        if let Some(points) = self
            .touchscreens
            .iter_mut()
            .find(|handler| handler.device() == id)
            .and_then(TouchscreenTriggerHandler::take_simulated_tap)
        {
            self.devices[index].touchscreen_tap(&points, self.ctx.emitter.as_ref(), now);
        }
        block
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let handlers: [&dyn InputEventHandler; 3] = [&self.keyboard, &self.mouse, &self.pointer];
        earliest(
            handlers
                .into_iter()
                .map(InputEventHandler::next_deadline)
                .chain(self.touchpads.iter().map(InputEventHandler::next_deadline))
                .chain(self.touchscreens.iter().map(InputEventHandler::next_deadline))
                .chain(self.devices.iter().map(InputDevice::next_deadline))
                .chain(std::iter::once(self.recorder.next_deadline())),
        )
    }

    /// Fire every timer whose deadline has passed
    pub fn dispatch_timers(&mut self) {
        let now = self.ctx.clock.now();
        self.recorder.dispatch_timers(now);
        self.keyboard.dispatch_timers();
        self.mouse.dispatch_timers();
        self.pointer.dispatch_timers();
        for handler in &mut self.touchpads {
            handler.dispatch_timers();
        }
        for handler in &mut self.touchscreens {
            handler.dispatch_timers();
        }
        for device in &mut self.devices {
            device.dispatch_timers(self.ctx.emitter.as_ref(), now);
        }
    }
}
