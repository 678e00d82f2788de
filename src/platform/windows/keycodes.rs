//! Windows virtual key code <-> `Key` mapping.
//!
//! VK codes are from winuser.h. The hook reports left/right modifier variants
//! (`VK_LSHIFT`, `VK_RSHIFT`, ...); both fold into the canonical modifier and
//! injection uses the left-hand code.

use windows_sys::Win32::UI::Input::KeyboardAndMouse::KEYEVENTF_EXTENDEDKEY;

use crate::event::Key;

const LETTERS: [Key; 26] = [
    Key::A, Key::B, Key::C, Key::D, Key::E, Key::F, Key::G, Key::H, Key::I,
    Key::J, Key::K, Key::L, Key::M, Key::N, Key::O, Key::P, Key::Q, Key::R,
    Key::S, Key::T, Key::U, Key::V, Key::W, Key::X, Key::Y, Key::Z,
];

const DIGITS: [Key; 10] = [
    Key::Key0, Key::Key1, Key::Key2, Key::Key3, Key::Key4,
    Key::Key5, Key::Key6, Key::Key7, Key::Key8, Key::Key9,
];

const NUMPAD_DIGITS: [Key; 10] = [
    Key::Numpad0, Key::Numpad1, Key::Numpad2, Key::Numpad3, Key::Numpad4,
    Key::Numpad5, Key::Numpad6, Key::Numpad7, Key::Numpad8, Key::Numpad9,
];

const FUNCTION_KEYS: [Key; 24] = [
    Key::F1, Key::F2, Key::F3, Key::F4, Key::F5, Key::F6,
    Key::F7, Key::F8, Key::F9, Key::F10, Key::F11, Key::F12,
    Key::F13, Key::F14, Key::F15, Key::F16, Key::F17, Key::F18,
    Key::F19, Key::F20, Key::F21, Key::F22, Key::F23, Key::F24,
];

/// `(key, vk, extended)` for everything outside the contiguous ranges.
/// Extended keys need `KEYEVENTF_EXTENDEDKEY` on injection and arrive with
/// `LLKHF_EXTENDED` set.
const NAMED: &[(Key, u16, bool)] = &[
    (Key::Shift, 0xA0, false),
    (Key::Ctrl, 0xA2, false),
    (Key::Alt, 0xA4, false),
    (Key::Meta, 0x5B, false),
    (Key::Space, 0x20, false),
    (Key::Enter, 0x0D, false),
    (Key::NumpadEnter, 0x0D, true),
    (Key::Tab, 0x09, false),
    (Key::Escape, 0x1B, false),
    (Key::Backspace, 0x08, false),
    (Key::Delete, 0x2E, true),
    (Key::Insert, 0x2D, true),
    (Key::Home, 0x24, true),
    (Key::End, 0x23, true),
    (Key::PageUp, 0x21, true),
    (Key::PageDown, 0x22, true),
    (Key::Up, 0x26, true),
    (Key::Down, 0x28, true),
    (Key::Left, 0x25, true),
    (Key::Right, 0x27, true),
    (Key::CapsLock, 0x14, false),
    (Key::NumLock, 0x90, false),
    (Key::ScrollLock, 0x91, false),
    (Key::PrintScreen, 0x2C, false),
    (Key::Pause, 0x13, false),
    (Key::NumpadAdd, 0x6B, false),
    (Key::NumpadSub, 0x6D, false),
    (Key::NumpadMul, 0x6A, false),
    (Key::NumpadDiv, 0x6F, true),
    // OEM codes, ANSI layout assumed
    (Key::Backtick, 0xC0, false),
    (Key::Minus, 0xBD, false),
    (Key::Equal, 0xBB, false),
    (Key::LeftBracket, 0xDB, false),
    (Key::RightBracket, 0xDD, false),
    (Key::Backslash, 0xDC, false),
    (Key::Semicolon, 0xBA, false),
    (Key::Apostrophe, 0xDE, false),
    (Key::Comma, 0xBC, false),
    (Key::Period, 0xBE, false),
    (Key::Slash, 0xBF, false),
];

/// Capture-only codes that fold into a canonical modifier.
const MODIFIER_ALIASES: &[(u16, Key)] = &[
    (0x10, Key::Shift),
    (0xA1, Key::Shift),
    (0x11, Key::Ctrl),
    (0xA3, Key::Ctrl),
    (0x12, Key::Alt),
    (0xA5, Key::Alt),
    (0x5C, Key::Meta),
];

/// Converts a hooked virtual key code to a `Key`.
///
/// `extended` is `LLKHF_EXTENDED` from `KBDLLHOOKSTRUCT.flags`; it only
/// matters for `VK_RETURN`, which doubles as NumpadEnter.
pub fn vk_to_key(vk: u16, extended: bool) -> Option<Key> {
    let range = |start: u16, keys: &[Key]| {
        vk.checked_sub(start)
            .and_then(|offset| keys.get(usize::from(offset)).copied())
    };
    range(0x41, &LETTERS[..])
        .or_else(|| range(0x30, &DIGITS[..]))
        .or_else(|| range(0x60, &NUMPAD_DIGITS[..]))
        .or_else(|| range(0x70, &FUNCTION_KEYS[..]))
        .or_else(|| {
            if vk == 0x0D {
                return Some(if extended { Key::NumpadEnter } else { Key::Enter });
            }
            NAMED
                .iter()
                .find(|&&(_, code, _)| code == vk)
                .map(|&(key, _, _)| key)
        })
        .or_else(|| {
            MODIFIER_ALIASES
                .iter()
                .find(|&&(code, _)| code == vk)
                .map(|&(_, key)| key)
        })
}

/// Converts a `Key` to the virtual key code and `KEYBDINPUT.dwFlags` bits
/// used to inject it.
pub fn key_to_vk(key: Key) -> Option<(u16, u32)> {
    let position = |keys: &[Key]| keys.iter().position(|&k| k == key);
    let vk = if let Some(i) = position(&LETTERS[..]) {
        0x41 + i as u16
    } else if let Some(i) = position(&DIGITS[..]) {
        0x30 + i as u16
    } else if let Some(i) = position(&NUMPAD_DIGITS[..]) {
        0x60 + i as u16
    } else if let Some(i) = position(&FUNCTION_KEYS[..]) {
        0x70 + i as u16
    } else {
        return NAMED
            .iter()
            .find(|&&(k, _, _)| k == key)
            .map(|&(_, vk, extended)| (vk, if extended { KEYEVENTF_EXTENDEDKEY } else { 0 }));
    };
    Some((vk, 0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_ranges() {
        assert_eq!(vk_to_key(0x41, false), Some(Key::A));
        assert_eq!(vk_to_key(0x5A, false), Some(Key::Z));
        assert_eq!(vk_to_key(0x39, false), Some(Key::Key9));
        assert_eq!(vk_to_key(0x69, false), Some(Key::Numpad9));
        assert_eq!(vk_to_key(0x87, false), Some(Key::F24));
    }

    #[test]
    fn numpad_enter_requires_extended_bit() {
        assert_eq!(vk_to_key(0x0D, false), Some(Key::Enter));
        assert_eq!(vk_to_key(0x0D, true), Some(Key::NumpadEnter));
    }

    #[test]
    fn right_modifiers_map_to_canonical() {
        assert_eq!(vk_to_key(0xA1, false), Some(Key::Shift));
        assert_eq!(vk_to_key(0xA3, false), Some(Key::Ctrl));
        assert_eq!(vk_to_key(0xA5, false), Some(Key::Alt));
        assert_eq!(vk_to_key(0x5C, false), Some(Key::Meta));
    }

    #[test]
    fn unknown_vk_is_none() {
        assert_eq!(vk_to_key(0xFF, false), None);
    }

    #[test]
    fn injection_codes() {
        assert_eq!(key_to_vk(Key::C), Some((0x43, 0)));
        assert_eq!(key_to_vk(Key::F5), Some((0x74, 0)));
        assert_eq!(key_to_vk(Key::Ctrl), Some((0xA2, 0)));
        assert_eq!(key_to_vk(Key::Up), Some((0x26, KEYEVENTF_EXTENDEDKEY)));
        assert_eq!(key_to_vk(Key::NumpadEnter), Some((0x0D, KEYEVENTF_EXTENDEDKEY)));
    }

    #[test]
    fn every_named_key_reads_back() {
        for &(key, vk, extended) in NAMED {
            assert_eq!(vk_to_key(vk, extended), Some(key), "vk {vk:#04x}");
        }
    }
}
