//! Key and button codes
//!
//! Keys and buttons are identified by their evdev scan codes. Names follow
//! the usual desktop conventions (BACK is `BTN_SIDE`, FORWARD is `BTN_EXTRA`).

use bitflags::bitflags;
use evdev::Key;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Evdev scan codes used by the engine
pub mod codes {
    use evdev::Key;

    pub const BTN_LEFT: u16 = Key::BTN_LEFT.code();
    pub const BTN_RIGHT: u16 = Key::BTN_RIGHT.code();
    pub const BTN_MIDDLE: u16 = Key::BTN_MIDDLE.code();
    pub const BTN_SIDE: u16 = Key::BTN_SIDE.code();
    pub const BTN_EXTRA: u16 = Key::BTN_EXTRA.code();
    pub const BTN_FORWARD: u16 = Key::BTN_FORWARD.code();
    pub const BTN_BACK: u16 = Key::BTN_BACK.code();
    pub const BTN_TASK: u16 = Key::BTN_TASK.code();
    pub const BTN_TOOL_FINGER: u16 = Key::BTN_TOOL_FINGER.code();
    pub const BTN_TOOL_DOUBLETAP: u16 = Key::BTN_TOOL_DOUBLETAP.code();
    pub const BTN_TOOL_TRIPLETAP: u16 = Key::BTN_TOOL_TRIPLETAP.code();
    pub const BTN_TOOL_QUADTAP: u16 = Key::BTN_TOOL_QUADTAP.code();
    pub const BTN_TOOL_QUINTTAP: u16 = Key::BTN_TOOL_QUINTTAP.code();
    pub const KEY_LEFTCTRL: u16 = Key::KEY_LEFTCTRL.code();
    pub const KEY_RIGHTCTRL: u16 = Key::KEY_RIGHTCTRL.code();
    pub const KEY_LEFTSHIFT: u16 = Key::KEY_LEFTSHIFT.code();
    pub const KEY_RIGHTSHIFT: u16 = Key::KEY_RIGHTSHIFT.code();
    pub const KEY_LEFTALT: u16 = Key::KEY_LEFTALT.code();
    pub const KEY_RIGHTALT: u16 = Key::KEY_RIGHTALT.code();
    pub const KEY_LEFTMETA: u16 = Key::KEY_LEFTMETA.code();
    pub const KEY_RIGHTMETA: u16 = Key::KEY_RIGHTMETA.code();
}

bitflags! {
    /// Keyboard modifiers derived from held keys
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KeyboardModifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

/// Modifier contributed by a key, if the key is a modifier
pub fn modifier_for_key(key: u16) -> Option<KeyboardModifiers> {
    use codes::*;
    match key {
        KEY_LEFTSHIFT | KEY_RIGHTSHIFT => Some(KeyboardModifiers::SHIFT),
        KEY_LEFTCTRL | KEY_RIGHTCTRL => Some(KeyboardModifiers::CONTROL),
        KEY_LEFTALT | KEY_RIGHTALT => Some(KeyboardModifiers::ALT),
        KEY_LEFTMETA | KEY_RIGHTMETA => Some(KeyboardModifiers::META),
        _ => None,
    }
}

pub fn is_modifier(key: u16) -> bool {
    modifier_for_key(key).is_some()
}

/// Modifiers active for a set of held keys
pub fn modifiers_for_keys<'a>(keys: impl IntoIterator<Item = &'a u16>) -> KeyboardModifiers {
    keys.into_iter()
        .filter_map(|key| modifier_for_key(*key))
        .fold(KeyboardModifiers::empty(), |acc, modifier| acc | modifier)
}

/// Ordered set of held keys
pub type KeySet = BTreeSet<u16>;

/// A mouse button, identified by its scan code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MouseButton(u16);

static MOUSE_BUTTON_NAMES: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    use codes::*;
    let mut names = HashMap::from([
        ("LEFT", BTN_LEFT),
        ("MIDDLE", BTN_MIDDLE),
        ("RIGHT", BTN_RIGHT),
        ("BACK", BTN_SIDE),
        ("FORWARD", BTN_EXTRA),
        ("TASK", BTN_FORWARD),
        ("SIDE", BTN_BACK),
        ("EXTRA", BTN_TASK),
        ("EXTRA1", BTN_SIDE),
        ("EXTRA2", BTN_EXTRA),
        ("EXTRA3", BTN_FORWARD),
        ("EXTRA4", BTN_BACK),
        ("EXTRA5", BTN_TASK),
    ]);
    for (i, name) in [
        "EXTRA6", "EXTRA7", "EXTRA8", "EXTRA9", "EXTRA10", "EXTRA11", "EXTRA12", "EXTRA13",
    ]
    .into_iter()
    .enumerate()
    {
        names.insert(name, 0x118 + i as u16);
    }
    names
});

impl MouseButton {
    pub const LEFT: MouseButton = MouseButton(codes::BTN_LEFT);
    pub const RIGHT: MouseButton = MouseButton(codes::BTN_RIGHT);
    pub const MIDDLE: MouseButton = MouseButton(codes::BTN_MIDDLE);
    pub const BACK: MouseButton = MouseButton(codes::BTN_SIDE);
    pub const FORWARD: MouseButton = MouseButton(codes::BTN_EXTRA);

    /// Mouse buttons occupy 0x110..=0x11f; anything else is not a mouse button
    pub fn from_scan_code(code: u16) -> Option<Self> {
        (0x110..=0x11f).contains(&code).then_some(MouseButton(code))
    }

    pub fn scan_code(&self) -> u16 {
        self.0
    }
}

impl From<MouseButton> for Key {
    fn from(button: MouseButton) -> Key {
        Key::new(button.0)
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = MOUSE_BUTTON_NAMES
            .iter()
            .filter(|(_, code)| **code == self.0)
            .map(|(name, _)| *name)
            .min_by_key(|name| name.len());
        match name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "0x{:x}", self.0),
        }
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MOUSE_BUTTON_NAMES
            .get(s.to_ascii_uppercase().as_str())
            .map(|code| MouseButton(*code))
            .ok_or_else(|| format!("unknown mouse button '{s}'"))
    }
}

impl Serialize for MouseButton {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MouseButton {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_button_range() {
        assert_eq!(MouseButton::from_scan_code(0x110), Some(MouseButton::LEFT));
        assert_eq!(MouseButton::from_scan_code(0x11f).map(|b| b.scan_code()), Some(0x11f));
        assert_eq!(MouseButton::from_scan_code(0x120), None);
        assert_eq!(MouseButton::from_scan_code(30), None);
    }

    #[test]
    fn test_mouse_button_names() {
        assert_eq!("back".parse::<MouseButton>(), Ok(MouseButton::BACK));
        assert_eq!("EXTRA13".parse::<MouseButton>().map(|b| b.scan_code()), Ok(0x11f));
        assert!("wheel".parse::<MouseButton>().is_err());
        assert_eq!(MouseButton::LEFT.to_string(), "LEFT");
    }

    #[test]
    fn test_modifiers_for_keys() {
        let keys: KeySet = [codes::KEY_LEFTCTRL, codes::KEY_RIGHTALT, 30].into_iter().collect();
        assert_eq!(
            modifiers_for_keys(&keys),
            KeyboardModifiers::CONTROL | KeyboardModifiers::ALT
        );
        assert!(is_modifier(codes::KEY_LEFTMETA));
        assert!(!is_modifier(30));
    }
}
