//! Common testing utilities for triggerd integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use triggerd::action::{Action, ActionContext, On, TriggerAction};
use triggerd::backend::evdev::{AxisRange, EvdevDecoder};
use triggerd::backend::{HandlerKind, InputBackend, LibinputBackend};
use triggerd::context::{EngineContext, InputEmitter, PointerPositionProvider};
use triggerd::geometry::Point;
use triggerd::input::{DeviceId, InputDevice, InputDeviceProperties, InputDeviceType, MouseButton};
use triggerd::timer::ManualClock;
use triggerd::trigger::Trigger;
use triggerd::variables::MemoryVariableStore;

/// Stands in for the environment receiving synthetic input
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    log: RefCell<Vec<String>>,
    pointer: Cell<Option<Point>>,
}

impl RecordingEmitter {
    pub fn take(&self) -> Vec<String> {
        self.log.take()
    }

    fn push(&self, entry: String) {
        self.log.borrow_mut().push(entry);
    }
}

impl InputEmitter for RecordingEmitter {
    fn keyboard_key(&self, key: u16, pressed: bool) {
        self.push(format!("key {key} {pressed}"));
    }

    fn keyboard_text(&self, text: &str) {
        self.push(format!("text {text}"));
    }

    fn keyboard_clear_modifiers(&self) {
        self.push("clear modifiers".into());
    }

    fn mouse_button(&self, button: MouseButton, pressed: bool) {
        self.push(format!("button {button} {pressed}"));
    }

    fn mouse_move(&self, delta: Point) {
        self.push(format!("move {} {}", delta.x, delta.y));
    }

    fn mouse_wheel(&self, delta: Point) {
        self.push(format!("wheel {} {}", delta.x, delta.y));
    }

    fn touchpad_pinch_begin(&self, fingers: u8) {
        self.push(format!("pinch begin {fingers}"));
    }

    fn touchpad_swipe_begin(&self, fingers: u8) {
        self.push(format!("swipe begin {fingers}"));
    }

    fn touchscreen_touch_down(&self, id: i32, position: Point) {
        self.push(format!("touch down {id} {} {}", position.x, position.y));
    }

    fn touchscreen_touch_up(&self, id: i32) {
        self.push(format!("touch up {id}"));
    }
}

impl PointerPositionProvider for RecordingEmitter {
    fn global_pointer_position(&self) -> Option<Point> {
        self.pointer.get()
    }

    fn set_global_pointer_position(&self, position: Point) {
        self.pointer.set(Some(position));
    }
}

/// Shared list of `name:stage` entries written by [`Record`]
#[derive(Debug, Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<String>>>);

impl Recorder {
    pub fn take(&self) -> Vec<String> {
        self.0.take()
    }
}

pub struct Record {
    recorder: Recorder,
    entry: String,
}

impl Record {
    pub fn new(recorder: &Recorder, entry: impl Into<String>) -> Self {
        Self {
            recorder: recorder.clone(),
            entry: entry.into(),
        }
    }
}

impl Action for Record {
    fn execute(&mut self, _: &ActionContext<'_>) {
        self.recorder.0.borrow_mut().push(self.entry.clone());
    }
}

/// Attach begin, end and cancel recordings to a trigger
pub fn recorded(recorder: &Recorder, trigger: Trigger, name: &str) -> Trigger {
    let stage = |on: On, stage: &str| TriggerAction::new(on, Record::new(recorder, format!("{name}:{stage}")));
    trigger
        .with_id(name)
        .with_action(stage(On::Begin, "begin"))
        .with_action(stage(On::End, "end"))
        .with_action(stage(On::Cancel, "cancel"))
}

pub fn context() -> (EngineContext, Rc<RecordingEmitter>, Rc<ManualClock>) {
    let emitter = Rc::new(RecordingEmitter::default());
    let clock = Rc::new(ManualClock::new());
    let ctx = EngineContext::new(
        emitter.clone(),
        emitter.clone(),
        Rc::new(MemoryVariableStore::new()),
        clock.clone(),
    );
    (ctx, emitter, clock)
}

/// A libinput backend wired to recording collaborators
pub struct Harness {
    pub libinput: LibinputBackend,
    pub emitter: Rc<RecordingEmitter>,
    pub clock: Rc<ManualClock>,
    pub recorder: Recorder,
}

impl Harness {
    pub fn new() -> Self {
        let (ctx, emitter, clock) = context();
        Self {
            libinput: LibinputBackend::new(InputBackend::new(ctx)),
            emitter,
            clock,
            recorder: Recorder::default(),
        }
    }

    pub fn add_device(&mut self, device_type: InputDeviceType, name: &str) -> DeviceId {
        self.libinput
            .backend_mut()
            .add_device(InputDevice::new(device_type, name, "event0"))
    }

    /// Multi-touch touchpad read through an evdev node of 1000x500 units
    pub fn add_evdev_touchpad(&mut self, name: &str) -> DeviceId {
        let id = self.add_device(InputDeviceType::Touchpad, name);
        let detected = InputDeviceProperties {
            multi_touch: Some(true),
            ..Default::default()
        };
        self.libinput.attach_evdev(
            id,
            Box::new(std::collections::VecDeque::new()),
            EvdevDecoder::new(AxisRange::new(0, 1000, 10), AxisRange::new(0, 500, 10)),
            &detected,
        );
        id
    }

    pub fn set_triggers(&mut self, kind: HandlerKind, triggers: impl Fn(&Recorder) -> Vec<Trigger> + 'static) {
        let recorder = self.recorder.clone();
        self.libinput
            .backend_mut()
            .set_triggers(kind, move || triggers(&recorder));
    }

    /// Move the clock forward, firing every timer that falls due on the way
    pub fn advance(&mut self, ms: u64) {
        let target = self.clock_now() + Duration::from_millis(ms);
        while let Some(deadline) = self.libinput.next_deadline().filter(|d| *d <= target) {
            self.clock.set(deadline);
            self.libinput.dispatch_timers();
            if self.libinput.next_deadline() == Some(deadline) {
                break;
            }
        }
        self.clock.set(target);
        self.libinput.dispatch_timers();
    }

    fn clock_now(&self) -> std::time::Instant {
        use triggerd::timer::Clock;
        self.clock.now()
    }
}

pub mod raw {
    //! Raw evdev events for a multi-touch device

    use evdev::{AbsoluteAxisType, EventType, InputEvent, Synchronization};

    pub const BTN_TOOL_FINGER: u16 = 0x145;

    pub fn abs(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    pub fn key(code: u16, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, code, value)
    }

    pub fn syn() -> InputEvent {
        InputEvent::new(EventType::SYNCHRONIZATION, Synchronization::SYN_REPORT.0, 0)
    }

    /// One finger touching down in slot 0
    pub fn finger_down(x: i32, y: i32) -> Vec<InputEvent> {
        vec![
            abs(AbsoluteAxisType::ABS_MT_SLOT, 0),
            abs(AbsoluteAxisType::ABS_MT_TRACKING_ID, 1),
            abs(AbsoluteAxisType::ABS_MT_POSITION_X, x),
            abs(AbsoluteAxisType::ABS_MT_POSITION_Y, y),
            key(BTN_TOOL_FINGER, 1),
            syn(),
        ]
    }

    pub fn finger_up() -> Vec<InputEvent> {
        vec![
            abs(AbsoluteAxisType::ABS_MT_SLOT, 0),
            abs(AbsoluteAxisType::ABS_MT_TRACKING_ID, -1),
            key(BTN_TOOL_FINGER, 0),
            syn(),
        ]
    }
}
