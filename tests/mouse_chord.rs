mod common;

use common::{recorded, Harness};
use pretty_assertions::assert_eq;
use test_log::test;
use triggerd::backend::HandlerKind;
use triggerd::geometry::Point;
use triggerd::input::keys::codes;
use triggerd::input::{InputDeviceType, MouseButton};
use triggerd::trigger::{SwipeDirection, Trigger, TriggerType};

fn swipe_right(exact_order: bool) -> impl Fn(&common::Recorder) -> Vec<Trigger> {
    move |recorder| {
        vec![recorded(
            recorder,
            Trigger::swipe(SwipeDirection::Right)
                .with_mouse_buttons(vec![MouseButton::LEFT, MouseButton::RIGHT], exact_order),
            "swipe",
        )]
    }
}

#[test]
fn test_cancelled_chord_swipe_delivers_both_buttons() {
    let mut h = Harness::new();
    let mouse = h.add_device(InputDeviceType::Mouse, "mouse");
    h.set_triggers(HandlerKind::Mouse, swipe_right(false));

    assert!(h.libinput.pointer_button(mouse, codes::BTN_LEFT, true));
    h.advance(10);
    assert!(h.libinput.pointer_button(mouse, codes::BTN_RIGHT, true));
    assert!(h.libinput.pointer_motion(mouse, Point::new(10.0, 0.0).into()));
    h.advance(50);
    assert!(h.emitter.take().is_empty());

    // moving the wrong way cancels the swipe and hands the chord back
    assert!(h.libinput.pointer_motion(mouse, Point::new(-10.0, 0.0).into()));
    assert!(h
        .libinput
        .backend()
        .mouse_handler()
        .motion()
        .triggers()
        .has_active_triggers(TriggerType::SWIPE));
    assert!(!h.libinput.pointer_motion(mouse, Point::new(-10.0, 0.0).into()));
    assert_eq!(h.emitter.take(), vec!["button LEFT true", "button RIGHT true"]);
    assert!(h.recorder.take().is_empty());

    assert!(!h.libinput.pointer_button(mouse, codes::BTN_LEFT, false));
    assert!(!h.libinput.pointer_button(mouse, codes::BTN_RIGHT, false));
    assert!(h.emitter.take().is_empty());
}

#[test]
fn test_exact_order_chord_pressed_backwards_does_not_activate() {
    let mut h = Harness::new();
    let mouse = h.add_device(InputDeviceType::Mouse, "mouse");
    h.set_triggers(HandlerKind::Mouse, swipe_right(true));

    h.libinput.pointer_button(mouse, codes::BTN_RIGHT, true);
    h.advance(10);
    h.libinput.pointer_button(mouse, codes::BTN_LEFT, true);
    h.advance(60);
    for _ in 0..3 {
        h.libinput.pointer_motion(mouse, Point::new(10.0, 0.0).into());
    }
    assert!(!h
        .libinput
        .backend()
        .mouse_handler()
        .motion()
        .triggers()
        .has_active_triggers(TriggerType::ALL));
    assert!(h.recorder.take().is_empty());
}
