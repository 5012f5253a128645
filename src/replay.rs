//! Scripted event replay
//!
//! A replay script lists devices, a handful of triggers per handler and
//! timestamped libinput-level events. [`Replay`] feeds them through a
//! [`LibinputBackend`] and writes every block decision, trigger lifecycle
//! step and emitted input to a shared [`Transcript`]. The binary prints the
//! transcript as JSON lines; tests read it directly.

use crate::action::{Action, ActionContext, InputAction, InputStep, On, TriggerAction};
use crate::backend::evdev::{AxisRange, EvdevDecoder};
use crate::backend::{HandlerKind, InputBackend, LibinputBackend};
use crate::condition::{ComparisonOperator, ConditionHandle, VariableCondition};
use crate::config::Settings;
use crate::context::{EngineContext, InputEmitter, PointerPositionProvider};
use crate::error::{TriggerError, TriggerResult};
use crate::geometry::{Point, PointDelta, Range};
use crate::input::{DeviceId, InputDevice, InputDeviceProperties, InputDeviceType, MouseButton};
use crate::timer::Clock;
use crate::trigger::{
    PinchDirection, RotateDirection, Stroke, SwipeDirection, Trigger, TriggerType, WheelDirection,
};
use crate::variables::{MemoryVariableStore, FINGERS};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub devices: Vec<ScriptDevice>,
    pub triggers: Vec<ScriptTrigger>,
    pub events: Vec<ScriptEvent>,
}

impl Script {
    pub fn from_json(json: &str) -> TriggerResult<Self> {
        let mut script: Script = serde_json::from_str(json)?;
        script.events.sort_by_key(|event| event.at_ms);
        Ok(script)
    }

    pub fn load(path: &Path) -> TriggerResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Time of the last event
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.events.last().map_or(0, |event| event.at_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptDevice {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: InputDeviceType,
    #[serde(default)]
    pub sys_name: String,
    /// Treated as detected from the hardware
    #[serde(default)]
    pub properties: InputDeviceProperties,
    /// Absolute axes as `[min, max, resolution]`, enables raw evdev events
    #[serde(default)]
    pub evdev: Option<ScriptAxes>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScriptAxes {
    pub x: (i32, i32, i32),
    pub y: (i32, i32, i32),
}

impl ScriptAxes {
    fn decoder(&self) -> EvdevDecoder {
        let (x, y) = (self.x, self.y);
        EvdevDecoder::new(AxisRange::new(x.0, x.1, x.2), AxisRange::new(y.0, y.1, y.2))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerDescription {
    Click,
    Hover,
    Press {
        #[serde(default)]
        instant: bool,
    },
    Tap,
    Shortcut {
        keys: Vec<u16>,
    },
    Swipe {
        direction: SwipeDirection,
    },
    Pinch {
        direction: PinchDirection,
    },
    Rotate {
        direction: RotateDirection,
    },
    Stroke {
        points: Vec<Point>,
    },
    Wheel {
        direction: WheelDirection,
        #[serde(default)]
        continuous: bool,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptTrigger {
    pub handler: HandlerKind,
    pub id: String,
    #[serde(flatten)]
    pub description: TriggerDescription,
    /// Only activate with this many fingers
    #[serde(default)]
    pub fingers: Option<u8>,
    #[serde(default)]
    pub mouse_buttons: Vec<MouseButton>,
    #[serde(default)]
    pub exact_order: bool,
    #[serde(default = "default_true")]
    pub block_events: bool,
    #[serde(default)]
    pub threshold: Option<Range>,
    /// Input written when the trigger ends
    #[serde(default)]
    pub on_end: Vec<InputStep>,
}

impl ScriptTrigger {
    fn build(&self, transcript: &Transcript) -> Trigger {
        let trigger = match &self.description {
            TriggerDescription::Click => Trigger::new(TriggerType::CLICK),
            TriggerDescription::Hover => Trigger::new(TriggerType::HOVER),
            TriggerDescription::Press { instant } => Trigger::new(TriggerType::PRESS).with_instant(*instant),
            TriggerDescription::Tap => Trigger::new(TriggerType::TAP),
            TriggerDescription::Shortcut { keys } => Trigger::keyboard_shortcut(keys.iter().copied()),
            TriggerDescription::Swipe { direction } => Trigger::swipe(*direction),
            TriggerDescription::Pinch { direction } => Trigger::pinch(*direction),
            TriggerDescription::Rotate { direction } => Trigger::rotate(*direction),
            TriggerDescription::Stroke { points } => Trigger::stroke(vec![Stroke::from_path(points)]),
            TriggerDescription::Wheel {
                direction,
                continuous,
            } => Trigger::wheel(*direction, *continuous),
        };
        let mut trigger = trigger.with_id(&self.id).with_block_events(self.block_events);
        if let Some(fingers) = self.fingers {
            trigger = trigger.with_activation_condition(ConditionHandle::new(VariableCondition::new(
                FINGERS,
                ComparisonOperator::EqualTo,
                fingers,
            )));
        }
        if !self.mouse_buttons.is_empty() {
            trigger = trigger.with_mouse_buttons(self.mouse_buttons.clone(), self.exact_order);
        }
        if let Some(threshold) = self.threshold {
            trigger = trigger.with_threshold(threshold);
        }
        for on in [On::Begin, On::End, On::Cancel] {
            trigger.add_action(TriggerAction::new(
                on,
                TranscriptAction {
                    trigger: self.id.clone(),
                    on,
                    transcript: transcript.clone(),
                },
            ));
        }
        if !self.on_end.is_empty() {
            trigger.add_action(TriggerAction::new(On::End, InputAction::new(self.on_end.clone())));
        }
        trigger
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEvent {
    pub at_ms: u64,
    /// Gesture updates and ends may leave it out
    #[serde(default)]
    pub device: Option<String>,
    #[serde(flatten)]
    pub input: ScriptInput,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptInput {
    KeyboardKey {
        key: u16,
        pressed: bool,
    },
    PointerAxis {
        delta: Point,
        #[serde(default)]
        one_axis_per_event: bool,
    },
    PointerButton {
        button: u16,
        pressed: bool,
    },
    PointerMotion {
        delta: Point,
        #[serde(default)]
        unaccelerated: Option<Point>,
    },
    HoldBegin {
        fingers: u8,
    },
    HoldEnd {
        #[serde(default)]
        cancelled: bool,
    },
    PinchBegin {
        fingers: u8,
    },
    PinchUpdate {
        scale: f64,
        #[serde(default)]
        angle_delta: f64,
    },
    PinchEnd {
        #[serde(default)]
        cancelled: bool,
    },
    SwipeBegin {
        fingers: u8,
    },
    SwipeUpdate {
        delta: Point,
    },
    SwipeEnd {
        #[serde(default)]
        cancelled: bool,
    },
    TouchDown {
        id: i32,
        position: Point,
    },
    TouchMotion {
        id: i32,
        position: Point,
    },
    TouchUp {
        id: i32,
    },
    TouchCancel,
    /// Raw event for a device declared with `evdev` axes
    Evdev {
        kind: u16,
        code: u16,
        value: i32,
    },
    /// Record the next stroke instead of recognizing triggers
    RecordStroke,
}

impl ScriptInput {
    fn name(&self) -> &'static str {
        match self {
            ScriptInput::KeyboardKey { .. } => "keyboard_key",
            ScriptInput::PointerAxis { .. } => "pointer_axis",
            ScriptInput::PointerButton { .. } => "pointer_button",
            ScriptInput::PointerMotion { .. } => "pointer_motion",
            ScriptInput::HoldBegin { .. } => "hold_begin",
            ScriptInput::HoldEnd { .. } => "hold_end",
            ScriptInput::PinchBegin { .. } => "pinch_begin",
            ScriptInput::PinchUpdate { .. } => "pinch_update",
            ScriptInput::PinchEnd { .. } => "pinch_end",
            ScriptInput::SwipeBegin { .. } => "swipe_begin",
            ScriptInput::SwipeUpdate { .. } => "swipe_update",
            ScriptInput::SwipeEnd { .. } => "swipe_end",
            ScriptInput::TouchDown { .. } => "touch_down",
            ScriptInput::TouchMotion { .. } => "touch_motion",
            ScriptInput::TouchUp { .. } => "touch_up",
            ScriptInput::TouchCancel => "touch_cancel",
            ScriptInput::Evdev { .. } => "evdev",
            ScriptInput::RecordStroke => "record_stroke",
        }
    }
}

/// One line of replay output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Output {
    Decision {
        at_ms: u64,
        event: String,
        block: bool,
    },
    Trigger {
        id: String,
        on: On,
    },
    Emitted {
        input: String,
    },
    Stroke {
        points: Vec<Point>,
    },
}

/// Shared, append-only output buffer
#[derive(Debug, Clone, Default)]
pub struct Transcript(Rc<RefCell<Vec<Output>>>);

impl Transcript {
    pub fn push(&self, output: Output) {
        self.0.borrow_mut().push(output);
    }

    pub fn drain(&self) -> Vec<Output> {
        self.0.borrow_mut().drain(..).collect()
    }
}

struct TranscriptAction {
    trigger: String,
    on: On,
    transcript: Transcript,
}

impl Action for TranscriptAction {
    fn execute(&mut self, _ctx: &ActionContext<'_>) {
        self.transcript.push(Output::Trigger {
            id: self.trigger.clone(),
            on: self.on,
        });
    }
}

/// Writes emitted input to the transcript and tracks the pointer
#[derive(Debug, Default)]
pub struct TranscriptEmitter {
    transcript: Transcript,
    pointer: Cell<Option<Point>>,
}

impl TranscriptEmitter {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            pointer: Cell::new(None),
        }
    }

    fn emit(&self, input: String) {
        self.transcript.push(Output::Emitted { input });
    }
}

impl InputEmitter for TranscriptEmitter {
    fn keyboard_key(&self, key: u16, pressed: bool) {
        self.emit(format!("key {key} {pressed}"));
    }

    fn keyboard_text(&self, text: &str) {
        self.emit(format!("text {text}"));
    }

    fn keyboard_clear_modifiers(&self) {
        self.emit("clear modifiers".to_string());
    }

    fn mouse_button(&self, button: MouseButton, pressed: bool) {
        self.emit(format!("button {button} {pressed}"));
    }

    fn mouse_move(&self, delta: Point) {
        if let Some(position) = self.pointer.get() {
            self.pointer.set(Some(position + delta));
        }
        self.emit(format!("move {} {}", delta.x, delta.y));
    }

    fn mouse_wheel(&self, delta: Point) {
        self.emit(format!("wheel {} {}", delta.x, delta.y));
    }

    fn touchpad_pinch_begin(&self, fingers: u8) {
        self.emit(format!("pinch begin {fingers}"));
    }

    fn touchpad_swipe_begin(&self, fingers: u8) {
        self.emit(format!("swipe begin {fingers}"));
    }

    fn touchscreen_touch_down(&self, id: i32, position: Point) {
        self.emit(format!("touch down {id} {} {}", position.x, position.y));
    }

    fn touchscreen_touch_up(&self, id: i32) {
        self.emit(format!("touch up {id}"));
    }
}

impl PointerPositionProvider for TranscriptEmitter {
    fn global_pointer_position(&self) -> Option<Point> {
        self.pointer.get()
    }

    fn set_global_pointer_position(&self, position: Point) {
        self.pointer.set(Some(position));
    }
}

pub struct Replay {
    libinput: LibinputBackend,
    devices: HashMap<String, DeviceId>,
    transcript: Transcript,
    start: Instant,
}

impl Replay {
    pub fn new(script: &Script, settings: &Settings, clock: Rc<dyn Clock>) -> Self {
        let transcript = Transcript::default();
        let emitter = Rc::new(TranscriptEmitter::new(transcript.clone()));
        let start = clock.now();
        let ctx = EngineContext::new(
            emitter.clone(),
            emitter,
            Rc::new(MemoryVariableStore::new()),
            clock,
        );
        let mut backend = InputBackend::new(ctx);
        backend.apply_settings(settings);

        for kind in [
            HandlerKind::Keyboard,
            HandlerKind::Mouse,
            HandlerKind::Pointer,
            HandlerKind::Touchpad,
            HandlerKind::Touchscreen,
        ] {
            let triggers: Vec<ScriptTrigger> =
                script.triggers.iter().filter(|t| t.handler == kind).cloned().collect();
            if triggers.is_empty() {
                continue;
            }
            let transcript = transcript.clone();
            backend.set_triggers(kind, move || triggers.iter().map(|t| t.build(&transcript)).collect());
        }

        let mut libinput = LibinputBackend::new(backend);
        let mut devices = HashMap::new();
        for declared in &script.devices {
            let mut device = InputDevice::new(declared.device_type, &declared.name, &declared.sys_name);
            device.properties = declared.properties.clone();
            let id = libinput.backend_mut().add_device(device);
            if let Some(axes) = &declared.evdev {
                let decoder = axes.decoder();
                let detected = InputDeviceProperties {
                    size: Some(decoder.size()),
                    ..Default::default()
                };
                libinput.attach_evdev(id, Box::new(VecDeque::new()), decoder, &detected);
            }
            devices.insert(declared.name.clone(), id);
        }
        info!(devices = devices.len(), triggers = script.triggers.len(), "replay ready");

        Self {
            libinput,
            devices,
            transcript,
            start,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn backend(&self) -> &LibinputBackend {
        &self.libinput
    }

    fn device(&self, name: Option<&str>) -> TriggerResult<Option<DeviceId>> {
        let Some(name) = name else {
            return Ok(None);
        };
        self.devices
            .get(name)
            .copied()
            .map(Some)
            .ok_or_else(|| TriggerError::UnknownDevice(name.to_string()))
    }

    fn require(&self, event: &ScriptEvent) -> TriggerResult<DeviceId> {
        self.device(event.device.as_deref())?
            .ok_or_else(|| TriggerError::UnknownDevice(format!("{} without a device", event.input.name())))
    }

    /// Feed one event and record the block decision
    pub fn apply(&mut self, event: &ScriptEvent) -> TriggerResult<bool> {
        let optional = self.device(event.device.as_deref())?;
        let block = match &event.input {
            ScriptInput::KeyboardKey { key, pressed } => {
                let device = self.require(event)?;
                self.libinput.keyboard_key(device, *key, *pressed)
            }
            ScriptInput::PointerAxis {
                delta,
                one_axis_per_event,
            } => {
                let device = self.require(event)?;
                self.libinput.pointer_axis(device, *delta, *one_axis_per_event)
            }
            ScriptInput::PointerButton { button, pressed } => {
                let device = self.require(event)?;
                self.libinput.pointer_button(device, *button, *pressed)
            }
            ScriptInput::PointerMotion { delta, unaccelerated } => {
                let device = self.require(event)?;
                let delta = PointDelta::new(*delta, unaccelerated.unwrap_or(*delta));
                self.libinput.pointer_motion(device, delta)
            }
            ScriptInput::HoldBegin { fingers } => {
                let device = self.require(event)?;
                self.libinput.touchpad_hold_begin(device, *fingers)
            }
            ScriptInput::HoldEnd { cancelled } => self.libinput.touchpad_hold_end(optional, *cancelled),
            ScriptInput::PinchBegin { fingers } => {
                let device = self.require(event)?;
                self.libinput.touchpad_pinch_begin(device, *fingers)
            }
            ScriptInput::PinchUpdate { scale, angle_delta } => {
                self.libinput.touchpad_pinch_update(optional, *scale, *angle_delta)
            }
            ScriptInput::PinchEnd { cancelled } => self.libinput.touchpad_pinch_end(optional, *cancelled),
            ScriptInput::SwipeBegin { fingers } => {
                let device = self.require(event)?;
                self.libinput.touchpad_swipe_begin(device, *fingers)
            }
            ScriptInput::SwipeUpdate { delta } => self.libinput.touchpad_swipe_update(optional, (*delta).into()),
            ScriptInput::SwipeEnd { cancelled } => self.libinput.touchpad_swipe_end(optional, *cancelled),
            ScriptInput::TouchDown { id, position } => {
                let device = self.require(event)?;
                self.libinput.touchscreen_touch_down(device, *id, *position)
            }
            ScriptInput::TouchMotion { id, position } => {
                let device = self.require(event)?;
                self.libinput.touchscreen_touch_motion(device, *id, *position)
            }
            ScriptInput::TouchUp { id } => {
                let device = self.require(event)?;
                self.libinput.touchscreen_touch_up(device, *id)
            }
            ScriptInput::TouchCancel => {
                let device = self.require(event)?;
                self.libinput.touchscreen_touch_cancel(device)
            }
            ScriptInput::Evdev { kind, code, value } => {
                let device = self.require(event)?;
                let raw = evdev::InputEvent::new(evdev::EventType(*kind), *code, *value);
                self.libinput.process_evdev(device, &[raw]);
                false
            }
            ScriptInput::RecordStroke => {
                let transcript = self.transcript.clone();
                self.libinput.backend_mut().record_stroke(move |stroke| {
                    transcript.push(Output::Stroke {
                        points: stroke.points().to_vec(),
                    })
                });
                false
            }
        };
        debug!(at_ms = event.at_ms, event = event.input.name(), block, "replayed");
        self.transcript.push(Output::Decision {
            at_ms: event.at_ms,
            event: event.input.name().to_string(),
            block,
        });
        Ok(block)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.libinput.next_deadline()
    }

    pub fn dispatch_timers(&mut self) {
        self.libinput.dispatch_timers();
    }

    /// Instant an event is due at
    pub fn due(&self, event: &ScriptEvent) -> Instant {
        self.start + Duration::from_millis(event.at_ms)
    }
}
