//! Raw input events shared by every backend and listener.
//!
//! Backends translate OS-specific codes into `Key` / `MouseEvent` before an
//! event reaches a `Device`; nothing above the platform layer sees a virtual
//! key code or an evdev code.

use std::fmt;
use std::time::Instant;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Device kind
// ---------------------------------------------------------------------------

/// The two kinds of device that own a low-level hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Keyboard,
    Mouse,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Keyboard => f.write_str("keyboard"),
            DeviceKind::Mouse => f.write_str("mouse"),
        }
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Canonical, layout-independent key identifier.
///
/// Left and right modifier variants are unified (`Ctrl`, `Shift`, `Alt`,
/// `Meta`). Variant names double as the spelling used in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum Key {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Key0, Key1, Key2, Key3, Key4, Key5, Key6, Key7, Key8, Key9,

    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    F13, F14, F15, F16, F17, F18, F19, F20, F21, F22, F23, F24,

    Shift, Ctrl, Alt, Meta,

    Space, Enter, Tab, Escape, Backspace, Delete, Insert,
    Home, End, PageUp, PageDown, Up, Down, Left, Right,

    CapsLock, NumLock, ScrollLock, PrintScreen, Pause,

    Numpad0, Numpad1, Numpad2, Numpad3, Numpad4,
    Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
    NumpadAdd, NumpadSub, NumpadMul, NumpadDiv, NumpadEnter,

    Backtick, Minus, Equal, LeftBracket, RightBracket, Backslash,
    Semicolon, Apostrophe, Comma, Period, Slash,
}

/// Whether a key went down or came back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

/// One keyboard transition as delivered by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
    /// Set when the OS marks the event as synthesized (e.g. `SendInput`).
    pub injected: bool,
    pub timestamp: Instant,
}

impl KeyEvent {
    /// A physical key-down stamped with the current time.
    pub fn down(key: Key) -> Self {
        Self::at(key, KeyState::Down, Instant::now())
    }

    /// A physical key-up stamped with the current time.
    pub fn up(key: Key) -> Self {
        Self::at(key, KeyState::Up, Instant::now())
    }

    pub fn at(key: Key, state: KeyState, timestamp: Instant) -> Self {
        Self {
            key,
            state,
            injected: false,
            timestamp,
        }
    }

    pub fn is_down(&self) -> bool {
        self.state == KeyState::Down
    }
}

// ---------------------------------------------------------------------------
// Mouse
// ---------------------------------------------------------------------------

/// Mouse activity a subscription can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum MouseEvent {
    Move,
    LeftButtonDown,
    LeftButtonUp,
    RightButtonDown,
    RightButtonUp,
    MiddleButtonDown,
    MiddleButtonUp,
    Scroll,
}

/// Screen position in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coordinates {
    pub x: i32,
    pub y: i32,
}

impl Coordinates {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One mouse event as delivered by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseInput {
    pub event: MouseEvent,
    /// Pointer position when known; evdev only reports relative motion.
    pub position: Option<Coordinates>,
    /// Wheel delta for `Scroll`, zero otherwise.
    pub delta: i32,
    pub timestamp: Instant,
}

impl MouseInput {
    pub fn new(event: MouseEvent) -> Self {
        Self::at(event, Instant::now())
    }

    pub fn at(event: MouseEvent, timestamp: Instant) -> Self {
        Self {
            event,
            position: None,
            delta: 0,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw event
// ---------------------------------------------------------------------------

/// Anything a `RawInputSource` can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    Key(KeyEvent),
    Mouse(MouseInput),
}

impl RawEvent {
    pub fn device(&self) -> DeviceKind {
        match self {
            RawEvent::Key(_) => DeviceKind::Keyboard,
            RawEvent::Mouse(_) => DeviceKind::Mouse,
        }
    }

    pub fn timestamp(&self) -> Instant {
        match self {
            RawEvent::Key(e) => e.timestamp,
            RawEvent::Mouse(e) => e.timestamp,
        }
    }
}

impl From<KeyEvent> for RawEvent {
    fn from(event: KeyEvent) -> Self {
        RawEvent::Key(event)
    }
}

impl From<MouseInput> for RawEvent {
    fn from(event: MouseInput) -> Self {
        RawEvent::Mouse(event)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
