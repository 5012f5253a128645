mod common;

use common::{raw, recorded, Harness};
use pretty_assertions::assert_eq;
use test_log::test;
use triggerd::backend::HandlerKind;
use triggerd::handlers::TouchpadState;
use triggerd::input::keys::codes;
use triggerd::trigger::{Trigger, TriggerType};

fn tap_harness() -> (Harness, triggerd::input::DeviceId) {
    let mut h = Harness::new();
    let pad = h.add_evdev_touchpad("pad");
    h.set_triggers(HandlerKind::Touchpad, |recorder| {
        vec![recorded(recorder, Trigger::new(TriggerType::TAP), "tap")]
    });
    (h, pad)
}

fn state(h: &Harness, pad: triggerd::input::DeviceId) -> Option<TouchpadState> {
    h.libinput.backend().touchpad_handler(pad).map(|handler| handler.state())
}

#[test]
fn test_tap_without_button_returns_to_none() {
    let (mut h, pad) = tap_harness();
    h.libinput.process_evdev(pad, &raw::finger_down(500, 250));
    assert_eq!(state(&h, pad), Some(TouchpadState::TapBegin));

    h.advance(80);
    h.libinput.process_evdev(pad, &raw::finger_up());
    assert_eq!(state(&h, pad), Some(TouchpadState::LibinputTapBegin));

    h.advance(299);
    assert_eq!(state(&h, pad), Some(TouchpadState::LibinputTapBegin));
    h.advance(1);
    assert_eq!(state(&h, pad), Some(TouchpadState::None));
    assert!(h.recorder.take().is_empty());
}

#[test]
fn test_tap_followed_by_button_activates_tap() {
    let (mut h, pad) = tap_harness();
    h.libinput.process_evdev(pad, &raw::finger_down(500, 250));
    h.advance(80);
    h.libinput.process_evdev(pad, &raw::finger_up());
    h.advance(100);

    assert!(h.libinput.pointer_button(pad, codes::BTN_LEFT, true));
    assert_eq!(h.recorder.take(), vec!["tap:begin", "tap:end"]);
    assert!(h.libinput.pointer_button(pad, codes::BTN_LEFT, false));
    assert_eq!(state(&h, pad), Some(TouchpadState::None));

    // an ordinary click afterwards is not a tap
    assert!(!h.libinput.pointer_button(pad, codes::BTN_LEFT, true));
    assert!(!h.libinput.pointer_button(pad, codes::BTN_LEFT, false));
    assert!(h.recorder.take().is_empty());
}

#[test]
fn test_ignored_touchpad_never_taps() {
    let (mut h, pad) = tap_harness();
    h.libinput.backend_mut().set_custom_device_properties(
        "pad",
        triggerd::input::InputDeviceProperties {
            ignore: Some(true),
            ..Default::default()
        },
    );
    h.libinput.process_evdev(pad, &raw::finger_down(500, 250));
    h.libinput.process_evdev(pad, &raw::finger_up());
    assert!(!h.libinput.pointer_button(pad, codes::BTN_LEFT, true));
    assert!(h.recorder.take().is_empty());
}
