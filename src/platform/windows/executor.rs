//! Key injection via `SendInput`.
//!
//! Injection is synchronous: `SendInput` returns once the events are queued.
//! Injected events reach the low-level hook with `LLKHF_INJECTED` set and are
//! delivered to listeners with `KeyEvent::injected`.

use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
    VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};

use super::keycodes::key_to_vk;
use crate::error::InputError;
use crate::event::Key;
use crate::platform::KeySimulator;

/// Stateless `SendInput` wrapper.
pub struct WindowsKeySimulator;

impl WindowsKeySimulator {
    pub fn new() -> Self {
        WindowsKeySimulator
    }
}

/// Virtual keys whose state `key` reflects. Modifiers use the side-neutral
/// codes so either physical key counts.
fn state_vks(key: Key) -> Vec<u16> {
    match key {
        Key::Shift => vec![VK_SHIFT],
        Key::Ctrl => vec![VK_CONTROL],
        Key::Alt => vec![VK_MENU],
        Key::Meta => vec![VK_LWIN, VK_RWIN],
        _ => key_to_vk(key).map(|(vk, _)| vec![vk]).unwrap_or_default(),
    }
}

fn keyboard_input(key: Key, up: bool) -> Result<INPUT, InputError> {
    let (vk, flags) = key_to_vk(key).ok_or_else(|| InputError::Simulation {
        key,
        reason: "no virtual key code".into(),
    })?;
    Ok(INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: if up { flags | KEYEVENTF_KEYUP } else { flags },
                time: 0,
                dwExtraInfo: 0,
            },
        },
    })
}

impl KeySimulator for WindowsKeySimulator {
    fn press(&self, key: Key) -> Result<(), InputError> {
        self.press_combination(&[key])
    }

    /// Queues all downs then all ups (reversed) in one `SendInput` call so no
    /// physical input can interleave.
    fn press_combination(&self, keys: &[Key]) -> Result<(), InputError> {
        let Some(&first) = keys.first() else {
            return Ok(());
        };
        let mut inputs = Vec::with_capacity(keys.len() * 2);
        for &key in keys {
            inputs.push(keyboard_input(key, false)?);
        }
        for &key in keys.iter().rev() {
            inputs.push(keyboard_input(key, true)?);
        }

        let sent = unsafe {
            SendInput(
                inputs.len() as u32,
                inputs.as_ptr(),
                std::mem::size_of::<INPUT>() as i32,
            )
        };
        if sent as usize != inputs.len() {
            return Err(InputError::Simulation {
                key: first,
                reason: format!(
                    "SendInput queued {sent} of {} events: {}",
                    inputs.len(),
                    std::io::Error::last_os_error()
                ),
            });
        }

        log::debug!("executor: injected {keys:?}");
        Ok(())
    }

    fn is_key_pressed(&self, key: Key) -> Result<bool, InputError> {
        let vks = state_vks(key);
        if vks.is_empty() {
            return Err(InputError::Unavailable(format!("no virtual key code for {key:?}")));
        }
        // High bit set: the key is down now.
        Ok(vks
            .into_iter()
            .any(|vk| unsafe { GetAsyncKeyState(i32::from(vk)) } < 0))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
