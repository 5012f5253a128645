//! Collaborators injected into the engine
//!
//! The engine never reaches for globals. The backend is built from an
//! [`EngineContext`] and hands clones of it to every handler it creates.

use crate::geometry::Point;
use crate::input::keys::MouseButton;
use crate::timer::Clock;
use crate::variables::VariableStore;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Sink for synthetic input written by the engine
pub trait InputEmitter {
    fn keyboard_key(&self, key: u16, pressed: bool);
    fn keyboard_text(&self, text: &str);
    /// Release every modifier the environment believes is held
    fn keyboard_clear_modifiers(&self);
    fn mouse_button(&self, button: MouseButton, pressed: bool);
    fn mouse_move(&self, delta: Point);
    fn mouse_wheel(&self, delta: Point);
    fn touchpad_pinch_begin(&self, fingers: u8);
    fn touchpad_swipe_begin(&self, fingers: u8);
    fn touchscreen_touch_down(&self, id: i32, position: Point);
    fn touchscreen_touch_up(&self, id: i32);
}

/// Global pointer position provider
pub trait PointerPositionProvider {
    fn global_pointer_position(&self) -> Option<Point>;
    fn set_global_pointer_position(&self, position: Point);
}

/// Shared "ignore synthetic events" flag
///
/// Set for as long as the engine itself is writing input, so that the
/// events it produces are not recognized again when they come back in.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFlag(Rc<Cell<bool>>);

impl IgnoreFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    /// Set the flag until the returned guard is dropped
    pub fn hold(&self) -> SyntheticEventGuard {
        let previous = self.0.replace(true);
        SyntheticEventGuard {
            flag: self.0.clone(),
            previous,
        }
    }
}

/// Restores the ignore flag on drop, including on early returns
#[must_use = "the ignore flag is released as soon as the guard is dropped"]
pub struct SyntheticEventGuard {
    flag: Rc<Cell<bool>>,
    previous: bool,
}

impl Drop for SyntheticEventGuard {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

impl fmt::Debug for SyntheticEventGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticEventGuard")
            .field("previous", &self.previous)
            .finish()
    }
}

/// Emitter that holds the ignore flag around every write
pub struct GuardedEmitter {
    inner: Rc<dyn InputEmitter>,
    ignore: IgnoreFlag,
}

impl GuardedEmitter {
    pub fn new(inner: Rc<dyn InputEmitter>, ignore: IgnoreFlag) -> Self {
        Self { inner, ignore }
    }

    fn guarded(&self, f: impl FnOnce(&dyn InputEmitter)) {
        let _guard = self.ignore.hold();
        f(self.inner.as_ref());
    }
}

impl InputEmitter for GuardedEmitter {
    fn keyboard_key(&self, key: u16, pressed: bool) {
        trace!(key, pressed, "emitting key");
        self.guarded(|e| e.keyboard_key(key, pressed));
    }

    fn keyboard_text(&self, text: &str) {
        self.guarded(|e| e.keyboard_text(text));
    }

    fn keyboard_clear_modifiers(&self) {
        trace!("clearing keyboard modifiers");
        self.guarded(|e| e.keyboard_clear_modifiers());
    }

    fn mouse_button(&self, button: MouseButton, pressed: bool) {
        trace!(%button, pressed, "emitting mouse button");
        self.guarded(|e| e.mouse_button(button, pressed));
    }

    fn mouse_move(&self, delta: Point) {
        self.guarded(|e| e.mouse_move(delta));
    }

    fn mouse_wheel(&self, delta: Point) {
        self.guarded(|e| e.mouse_wheel(delta));
    }

    fn touchpad_pinch_begin(&self, fingers: u8) {
        self.guarded(|e| e.touchpad_pinch_begin(fingers));
    }

    fn touchpad_swipe_begin(&self, fingers: u8) {
        self.guarded(|e| e.touchpad_swipe_begin(fingers));
    }

    fn touchscreen_touch_down(&self, id: i32, position: Point) {
        self.guarded(|e| e.touchscreen_touch_down(id, position));
    }

    fn touchscreen_touch_up(&self, id: i32) {
        self.guarded(|e| e.touchscreen_touch_up(id));
    }
}

/// Handles to every external collaborator
#[derive(Clone)]
pub struct EngineContext {
    pub emitter: Rc<dyn InputEmitter>,
    pub pointer: Rc<dyn PointerPositionProvider>,
    pub variables: Rc<dyn VariableStore>,
    pub clock: Rc<dyn Clock>,
}

impl EngineContext {
    pub fn new(
        emitter: Rc<dyn InputEmitter>,
        pointer: Rc<dyn PointerPositionProvider>,
        variables: Rc<dyn VariableStore>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            emitter,
            pointer,
            variables,
            clock,
        }
    }

    /// Same collaborators, with every emitter write wrapped in the ignore flag
    pub fn guarded(&self, ignore: &IgnoreFlag) -> Self {
        Self {
            emitter: Rc::new(GuardedEmitter::new(self.emitter.clone(), ignore.clone())),
            ..self.clone()
        }
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_on_drop() {
        let flag = IgnoreFlag::new();
        {
            let _guard = flag.hold();
            assert!(flag.is_set());
            {
                let _nested = flag.hold();
                assert!(flag.is_set());
            }
            assert!(flag.is_set());
        }
        assert!(!flag.is_set());
    }

    #[test]
    fn test_guard_released_on_early_return() {
        fn write(flag: &IgnoreFlag, bail: bool) -> Option<()> {
            let _guard = flag.hold();
            if bail {
                return None;
            }
            Some(())
        }

        let flag = IgnoreFlag::new();
        assert!(write(&flag, true).is_none());
        assert!(!flag.is_set());
        assert!(write(&flag, false).is_some());
        assert!(!flag.is_set());
    }
}
