//! Action that writes synthetic input

use super::{Action, ActionContext};
use crate::geometry::Point;
use crate::input::keys::MouseButton;
use serde::{Deserialize, Serialize};

/// One step of an input sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputStep {
    KeyPress(u16),
    KeyRelease(u16),
    Text(String),
    MousePress(MouseButton),
    MouseRelease(MouseButton),
    /// Move by a fixed delta
    MouseMoveBy(Point),
    /// Move by the trigger's latest multiplied motion delta
    MouseMoveByDelta,
    Wheel(Point),
}

/// Plays a fixed sequence of input steps through the emitter
#[derive(Debug, Clone, Default)]
pub struct InputAction {
    pub steps: Vec<InputStep>,
}

impl InputAction {
    pub fn new(steps: Vec<InputStep>) -> Self {
        Self { steps }
    }

    /// Press and release every key in order, releasing in reverse
    pub fn key_combination(keys: &[u16]) -> Self {
        let mut steps: Vec<_> = keys.iter().map(|k| InputStep::KeyPress(*k)).collect();
        steps.extend(keys.iter().rev().map(|k| InputStep::KeyRelease(*k)));
        Self { steps }
    }
}

impl Action for InputAction {
    fn execute(&mut self, ctx: &ActionContext<'_>) {
        for step in &self.steps {
            match step {
                InputStep::KeyPress(key) => ctx.emitter.keyboard_key(*key, true),
                InputStep::KeyRelease(key) => ctx.emitter.keyboard_key(*key, false),
                InputStep::Text(text) => ctx.emitter.keyboard_text(text),
                InputStep::MousePress(button) => ctx.emitter.mouse_button(*button, true),
                InputStep::MouseRelease(button) => ctx.emitter.mouse_button(*button, false),
                InputStep::MouseMoveBy(delta) => ctx.emitter.mouse_move(*delta),
                InputStep::MouseMoveByDelta => {
                    ctx.emitter.mouse_move(ctx.delta_multiplied.accelerated)
                }
                InputStep::Wheel(delta) => ctx.emitter.mouse_wheel(*delta),
            }
        }
    }

    fn emits_input(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_combination_releases_in_reverse() {
        let action = InputAction::key_combination(&[29, 46]);
        assert_eq!(
            action.steps,
            vec![
                InputStep::KeyPress(29),
                InputStep::KeyPress(46),
                InputStep::KeyRelease(46),
                InputStep::KeyRelease(29),
            ]
        );
    }
}
