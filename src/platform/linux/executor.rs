//! Key injection through a uinput virtual keyboard.
//!
//! The virtual device is created once and declares every key `key_to_evdev`
//! can produce. Injected events go through the kernel input stack, so the
//! evdev capture sees them like physical presses on a separate device.
//!
//! Key state queries read the kernel's key bitmap of every keyboard.
//!
//! Requires write access to /dev/uinput.

use std::io;
use std::sync::{Mutex, PoisonError};

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key as EvdevKey};

use super::capture::enumerate;
use super::keycodes::{evdev_codes, injectable_codes, key_to_evdev};
use crate::error::InputError;
use crate::event::{DeviceKind, Key};
use crate::platform::KeySimulator;

const DEVICE_NAME: &str = "hookhub virtual keyboard";

pub struct UinputKeySimulator {
    device: Mutex<VirtualDevice>,
}

impl UinputKeySimulator {
    pub fn new() -> Result<Self, InputError> {
        let mut keys = AttributeSet::<EvdevKey>::new();
        for code in injectable_codes() {
            keys.insert(EvdevKey::new(code));
        }
        let device = VirtualDeviceBuilder::new()
            .and_then(|builder| builder.name(DEVICE_NAME).with_keys(&keys))
            .and_then(|builder| builder.build())
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => {
                    InputError::PermissionDenied(format!("cannot open /dev/uinput: {e}"))
                }
                _ => InputError::Unavailable(format!("cannot create uinput device: {e}")),
            })?;
        log::info!("executor: created {DEVICE_NAME:?}");
        Ok(Self {
            device: Mutex::new(device),
        })
    }
}

fn code(key: Key) -> Result<u16, InputError> {
    key_to_evdev(key).ok_or_else(|| InputError::Simulation {
        key,
        reason: "no evdev key code".into(),
    })
}

impl KeySimulator for UinputKeySimulator {
    fn press(&self, key: Key) -> Result<(), InputError> {
        self.press_combination(&[key])
    }

    /// Each transition is its own `SYN_REPORT` frame so applications see the
    /// modifiers held before the final key arrives.
    fn press_combination(&self, keys: &[Key]) -> Result<(), InputError> {
        let Some(&first) = keys.first() else {
            return Ok(());
        };
        let codes = keys.iter().map(|&key| code(key)).collect::<Result<Vec<_>, _>>()?;

        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let transitions = codes
            .iter()
            .map(|&c| (c, 1))
            .chain(codes.iter().rev().map(|&c| (c, 0)));
        for (c, value) in transitions {
            device
                .emit(&[InputEvent::new(EventType::KEY, c, value)])
                .map_err(|e| InputError::Simulation {
                    key: first,
                    reason: e.to_string(),
                })?;
        }

        log::debug!("executor: injected {keys:?}");
        Ok(())
    }

    fn is_key_pressed(&self, key: Key) -> Result<bool, InputError> {
        let codes: Vec<u16> = evdev_codes(key).collect();
        let keyboards = enumerate(DeviceKind::Keyboard);
        if keyboards.is_empty() {
            return Err(InputError::Unavailable(
                "no readable keyboard in /dev/input/".into(),
            ));
        }
        for keyboard in &keyboards {
            let held = keyboard
                .get_key_state()
                .map_err(|e| InputError::Unavailable(format!("cannot read key state: {e}")))?;
            if codes.iter().any(|&c| held.contains(EvdevKey::new(c))) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_has_a_code() {
        for key in [Key::A, Key::Ctrl, Key::F24, Key::NumpadEnter, Key::Slash] {
            assert!(code(key).is_ok(), "{key:?}");
        }
    }
}
