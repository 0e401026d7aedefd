//! Virtual key codes and their mappings to the injection and hook crates.
//!
//! Commands store keys as Windows-style virtual key codes so scripts stay
//! portable across backends. A code is *recognized* when it maps onto the
//! injection backend (`enigo`) or is a modifier; unrecognized codes fail
//! command validation instead of silently doing nothing at dispatch time.

use serde::{Deserialize, Serialize};

/// A virtual key code in Windows VK numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    /// Backspace.
    pub const BACK: KeyCode = KeyCode(0x08);
    /// Tab.
    pub const TAB: KeyCode = KeyCode(0x09);
    /// Return / Enter.
    pub const RETURN: KeyCode = KeyCode(0x0D);
    /// Shift (side-agnostic).
    pub const SHIFT: KeyCode = KeyCode(0x10);
    /// Control (side-agnostic).
    pub const CONTROL: KeyCode = KeyCode(0x11);
    /// Alt (side-agnostic).
    pub const ALT: KeyCode = KeyCode(0x12);
    /// Caps Lock.
    pub const CAPS_LOCK: KeyCode = KeyCode(0x14);
    /// Escape.
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    /// Space bar.
    pub const SPACE: KeyCode = KeyCode(0x20);
    /// Page Up.
    pub const PAGE_UP: KeyCode = KeyCode(0x21);
    /// Page Down.
    pub const PAGE_DOWN: KeyCode = KeyCode(0x22);
    /// End.
    pub const END: KeyCode = KeyCode(0x23);
    /// Home.
    pub const HOME: KeyCode = KeyCode(0x24);
    /// Left arrow.
    pub const LEFT: KeyCode = KeyCode(0x25);
    /// Up arrow.
    pub const UP: KeyCode = KeyCode(0x26);
    /// Right arrow.
    pub const RIGHT: KeyCode = KeyCode(0x27);
    /// Down arrow.
    pub const DOWN: KeyCode = KeyCode(0x28);
    /// Delete.
    pub const DELETE: KeyCode = KeyCode(0x2E);
    /// Left Windows / Meta key.
    pub const META: KeyCode = KeyCode(0x5B);
    /// Right Windows / Meta key.
    pub const META_RIGHT: KeyCode = KeyCode(0x5C);
    /// F1.
    pub const F1: KeyCode = KeyCode(0x70);
    /// F12.
    pub const F12: KeyCode = KeyCode(0x7B);

    /// Whether this code is a modifier key (either side-agnostic or sided).
    #[must_use]
    pub fn is_modifier(self) -> bool {
        matches!(
            self.0,
            0x10..=0x12      // Shift, Control, Alt
            | 0x5B | 0x5C    // Meta left/right
            | 0xA0..=0xA5    // sided Shift/Control/Alt
        )
    }

    /// Whether this code is one of F1..F12.
    #[must_use]
    pub fn is_function_key(self) -> bool {
        (0x70..=0x7B).contains(&self.0)
    }

    /// Whether this code maps onto a backend key and may appear in commands.
    #[must_use]
    pub fn is_recognized(self) -> bool {
        self.is_modifier() || to_enigo(self).is_some()
    }
}

/// Map a virtual key code onto the injection backend's key type.
///
/// Returns `None` for codes the backend cannot synthesize.
#[must_use]
pub fn to_enigo(key: KeyCode) -> Option<enigo::Key> {
    use enigo::Key;

    let mapped = match key.0 {
        // Letters inject as lowercase unicode; a recorded Shift key event
        // carries the case, exactly as the physical sequence did.
        c @ 0x41..=0x5A => Key::Unicode((c as u8 as char).to_ascii_lowercase()),
        c @ 0x30..=0x39 => Key::Unicode(c as u8 as char),
        // Numpad digits lose their numpad-ness on injection.
        c @ 0x60..=0x69 => Key::Unicode((b'0' + (c - 0x60) as u8) as char),
        0x08 => Key::Backspace,
        0x09 => Key::Tab,
        0x0D => Key::Return,
        0x10 | 0xA0 | 0xA1 => Key::Shift,
        0x11 | 0xA2 | 0xA3 => Key::Control,
        0x12 | 0xA4 | 0xA5 => Key::Alt,
        0x14 => Key::CapsLock,
        0x1B => Key::Escape,
        0x20 => Key::Space,
        0x21 => Key::PageUp,
        0x22 => Key::PageDown,
        0x23 => Key::End,
        0x24 => Key::Home,
        0x25 => Key::LeftArrow,
        0x26 => Key::UpArrow,
        0x27 => Key::RightArrow,
        0x28 => Key::DownArrow,
        0x2E => Key::Delete,
        0x5B | 0x5C => Key::Meta,
        0x70 => Key::F1,
        0x71 => Key::F2,
        0x72 => Key::F3,
        0x73 => Key::F4,
        0x74 => Key::F5,
        0x75 => Key::F6,
        0x76 => Key::F7,
        0x77 => Key::F8,
        0x78 => Key::F9,
        0x79 => Key::F10,
        0x7A => Key::F11,
        0x7B => Key::F12,
        // OEM punctuation, US layout.
        0xBA => Key::Unicode(';'),
        0xBB => Key::Unicode('='),
        0xBC => Key::Unicode(','),
        0xBD => Key::Unicode('-'),
        0xBE => Key::Unicode('.'),
        0xBF => Key::Unicode('/'),
        0xC0 => Key::Unicode('`'),
        0xDB => Key::Unicode('['),
        0xDC => Key::Unicode('\\'),
        0xDD => Key::Unicode(']'),
        0xDE => Key::Unicode('\''),
        _ => return None,
    };

    Some(mapped)
}

/// Map a hook-reported key onto a virtual key code.
///
/// Returns `None` for keys the command model does not represent; the
/// recorder skips those events.
#[must_use]
pub fn from_rdev(key: rdev::Key) -> Option<KeyCode> {
    use rdev::Key as R;

    let code: u16 = match key {
        R::KeyA => 0x41,
        R::KeyB => 0x42,
        R::KeyC => 0x43,
        R::KeyD => 0x44,
        R::KeyE => 0x45,
        R::KeyF => 0x46,
        R::KeyG => 0x47,
        R::KeyH => 0x48,
        R::KeyI => 0x49,
        R::KeyJ => 0x4A,
        R::KeyK => 0x4B,
        R::KeyL => 0x4C,
        R::KeyM => 0x4D,
        R::KeyN => 0x4E,
        R::KeyO => 0x4F,
        R::KeyP => 0x50,
        R::KeyQ => 0x51,
        R::KeyR => 0x52,
        R::KeyS => 0x53,
        R::KeyT => 0x54,
        R::KeyU => 0x55,
        R::KeyV => 0x56,
        R::KeyW => 0x57,
        R::KeyX => 0x58,
        R::KeyY => 0x59,
        R::KeyZ => 0x5A,
        R::Num0 => 0x30,
        R::Num1 => 0x31,
        R::Num2 => 0x32,
        R::Num3 => 0x33,
        R::Num4 => 0x34,
        R::Num5 => 0x35,
        R::Num6 => 0x36,
        R::Num7 => 0x37,
        R::Num8 => 0x38,
        R::Num9 => 0x39,
        R::Kp0 => 0x60,
        R::Kp1 => 0x61,
        R::Kp2 => 0x62,
        R::Kp3 => 0x63,
        R::Kp4 => 0x64,
        R::Kp5 => 0x65,
        R::Kp6 => 0x66,
        R::Kp7 => 0x67,
        R::Kp8 => 0x68,
        R::Kp9 => 0x69,
        R::F1 => 0x70,
        R::F2 => 0x71,
        R::F3 => 0x72,
        R::F4 => 0x73,
        R::F5 => 0x74,
        R::F6 => 0x75,
        R::F7 => 0x76,
        R::F8 => 0x77,
        R::F9 => 0x78,
        R::F10 => 0x79,
        R::F11 => 0x7A,
        R::F12 => 0x7B,
        R::ShiftLeft => 0xA0,
        R::ShiftRight => 0xA1,
        R::ControlLeft => 0xA2,
        R::ControlRight => 0xA3,
        R::Alt => 0xA4,
        R::AltGr => 0xA5,
        R::MetaLeft => 0x5B,
        R::MetaRight => 0x5C,
        R::Backspace => 0x08,
        R::Tab => 0x09,
        R::Return | R::KpReturn => 0x0D,
        R::CapsLock => 0x14,
        R::Escape => 0x1B,
        R::Space => 0x20,
        R::PageUp => 0x21,
        R::PageDown => 0x22,
        R::End => 0x23,
        R::Home => 0x24,
        R::LeftArrow => 0x25,
        R::UpArrow => 0x26,
        R::RightArrow => 0x27,
        R::DownArrow => 0x28,
        R::Insert => 0x2D,
        R::Delete | R::KpDelete => 0x2E,
        R::SemiColon => 0xBA,
        R::Equal => 0xBB,
        R::Comma => 0xBC,
        R::Minus => 0xBD,
        R::Dot => 0xBE,
        R::Slash => 0xBF,
        R::BackQuote => 0xC0,
        R::LeftBracket => 0xDB,
        R::BackSlash => 0xDC,
        R::RightBracket => 0xDD,
        R::Quote => 0xDE,
        _ => return None,
    };

    Some(KeyCode(code))
}
