//! Linux evdev key code <-> `Key` mapping.
//!
//! Codes are from `linux/input-event-codes.h`. Right-hand modifiers fold into
//! the canonical modifier on capture; injection uses the left-hand code.

use crate::event::Key;

/// `(key, evdev code)`; the first entry for a key is its injection code.
const TABLE: &[(Key, u16)] = &[
    (Key::Escape, 1),
    (Key::Key1, 2),
    (Key::Key2, 3),
    (Key::Key3, 4),
    (Key::Key4, 5),
    (Key::Key5, 6),
    (Key::Key6, 7),
    (Key::Key7, 8),
    (Key::Key8, 9),
    (Key::Key9, 10),
    (Key::Key0, 11),
    (Key::Minus, 12),
    (Key::Equal, 13),
    (Key::Backspace, 14),
    (Key::Tab, 15),
    (Key::Q, 16),
    (Key::W, 17),
    (Key::E, 18),
    (Key::R, 19),
    (Key::T, 20),
    (Key::Y, 21),
    (Key::U, 22),
    (Key::I, 23),
    (Key::O, 24),
    (Key::P, 25),
    (Key::LeftBracket, 26),
    (Key::RightBracket, 27),
    (Key::Enter, 28),
    (Key::Ctrl, 29),
    (Key::A, 30),
    (Key::S, 31),
    (Key::D, 32),
    (Key::F, 33),
    (Key::G, 34),
    (Key::H, 35),
    (Key::J, 36),
    (Key::K, 37),
    (Key::L, 38),
    (Key::Semicolon, 39),
    (Key::Apostrophe, 40),
    (Key::Backtick, 41),
    (Key::Shift, 42),
    (Key::Backslash, 43),
    (Key::Z, 44),
    (Key::X, 45),
    (Key::C, 46),
    (Key::V, 47),
    (Key::B, 48),
    (Key::N, 49),
    (Key::M, 50),
    (Key::Comma, 51),
    (Key::Period, 52),
    (Key::Slash, 53),
    (Key::Shift, 54),
    (Key::NumpadMul, 55),
    (Key::Alt, 56),
    (Key::Space, 57),
    (Key::CapsLock, 58),
    (Key::F1, 59),
    (Key::F2, 60),
    (Key::F3, 61),
    (Key::F4, 62),
    (Key::F5, 63),
    (Key::F6, 64),
    (Key::F7, 65),
    (Key::F8, 66),
    (Key::F9, 67),
    (Key::F10, 68),
    (Key::NumLock, 69),
    (Key::ScrollLock, 70),
    (Key::Numpad7, 71),
    (Key::Numpad8, 72),
    (Key::Numpad9, 73),
    (Key::NumpadSub, 74),
    (Key::Numpad4, 75),
    (Key::Numpad5, 76),
    (Key::Numpad6, 77),
    (Key::NumpadAdd, 78),
    (Key::Numpad1, 79),
    (Key::Numpad2, 80),
    (Key::Numpad3, 81),
    (Key::Numpad0, 82),
    (Key::F11, 87),
    (Key::F12, 88),
    (Key::NumpadEnter, 96),
    (Key::Ctrl, 97),
    (Key::NumpadDiv, 98),
    (Key::PrintScreen, 99),
    (Key::Alt, 100),
    (Key::Home, 102),
    (Key::Up, 103),
    (Key::PageUp, 104),
    (Key::Left, 105),
    (Key::Right, 106),
    (Key::End, 107),
    (Key::Down, 108),
    (Key::PageDown, 109),
    (Key::Insert, 110),
    (Key::Delete, 111),
    (Key::Pause, 119),
    (Key::Meta, 125),
    (Key::Meta, 126),
    (Key::F13, 183),
    (Key::F14, 184),
    (Key::F15, 185),
    (Key::F16, 186),
    (Key::F17, 187),
    (Key::F18, 188),
    (Key::F19, 189),
    (Key::F20, 190),
    (Key::F21, 191),
    (Key::F22, 192),
    (Key::F23, 193),
    (Key::F24, 194),
];

/// Converts an evdev key code to a `Key`. Media and vendor keys map to `None`.
pub fn evdev_to_key(code: u16) -> Option<Key> {
    TABLE
        .iter()
        .find(|&&(_, c)| c == code)
        .map(|&(key, _)| key)
}

/// Converts a `Key` to the evdev code used to inject it.
pub fn key_to_evdev(key: Key) -> Option<u16> {
    TABLE
        .iter()
        .find(|&&(k, _)| k == key)
        .map(|&(_, code)| code)
}

/// Every code that reports `key`, right-hand modifiers included.
pub fn evdev_codes(key: Key) -> impl Iterator<Item = u16> {
    TABLE
        .iter()
        .filter(move |&&(k, _)| k == key)
        .map(|&(_, code)| code)
}

/// Every code `key_to_evdev` can produce; a uinput device must declare them.
pub fn injectable_codes() -> impl Iterator<Item = u16> {
    let mut seen = Vec::with_capacity(TABLE.len());
    TABLE.iter().filter_map(move |&(key, code)| {
        if seen.contains(&key) {
            return None;
        }
        seen.push(key);
        Some(code)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
