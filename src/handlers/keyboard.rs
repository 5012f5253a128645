//! Keyboard shortcuts

use super::{InputEventHandler, TriggerHandler};
use crate::context::EngineContext;
use crate::input::keys::is_modifier;
use crate::input::{InputDevice, InputEvent, KeySet};
use crate::trigger::{TriggerActivationEvent, TriggerType};
use std::time::Instant;
use tracing::trace;

/// Activates shortcut triggers while a chord that starts with a modifier is held
#[derive(Debug)]
pub struct KeyboardTriggerHandler {
    triggers: TriggerHandler,
    keys: KeySet,
    first_key: Option<u16>,
    block: bool,
}

impl KeyboardTriggerHandler {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            triggers: TriggerHandler::new(ctx),
            keys: KeySet::new(),
            first_key: None,
            block: false,
        }
    }

    pub fn triggers(&self) -> &TriggerHandler {
        &self.triggers
    }

    pub fn triggers_mut(&mut self) -> &mut TriggerHandler {
        &mut self.triggers
    }

    fn activation_event(&self) -> TriggerActivationEvent {
        TriggerActivationEvent {
            keyboard_keys: Some(self.keys.clone()),
            ..Default::default()
        }
    }

    fn keyboard_key(&mut self, key: u16, pressed: bool) -> bool {
        let modifier = is_modifier(key);
        if pressed {
            self.keys.insert(key);
            if self.keys.len() == 1 {
                self.first_key = Some(key);
            }

            // typing must never be hijacked, so the chord has to start with a modifier
            self.block = if self.first_key.is_some_and(is_modifier) {
                let event = self.activation_event();
                self.triggers
                    .activate_triggers(TriggerType::KEYBOARD_SHORTCUT, &event)
                    .success
            } else {
                false
            };
            trace!(key, block = self.block, "keyboard shortcut key pressed");
            return self.block && !modifier;
        }

        self.keys.remove(&key);
        if self.keys.is_empty() {
            self.first_key = None;
        }
        self.triggers.keyboard_key(false);
        self.block && !modifier
    }
}

impl InputEventHandler for KeyboardTriggerHandler {
    fn handle_event(&mut self, _device: &InputDevice, event: &InputEvent) -> bool {
        match event {
            InputEvent::KeyboardKey { key, pressed } => self.keyboard_key(*key, *pressed),
            _ => false,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.triggers.next_deadline()
    }

    fn dispatch_timers(&mut self) {
        self.triggers.dispatch_timers();
    }
}
