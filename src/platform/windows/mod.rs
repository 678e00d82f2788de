//! Windows platform backend: `WH_KEYBOARD_LL` / `WH_MOUSE_LL` hooks,
//! `SendInput` injection.

mod executor;
mod hook;
pub mod keycodes;

use executor::WindowsKeySimulator;
use hook::LowLevelHook;

use crate::error::InputError;
use crate::event::DeviceKind;
use crate::platform::{KeySimulator, RawInputSource};

/// Returns a `LowLevelHook` for `kind`. Nothing is installed until `hook()`.
pub fn create_input_source(kind: DeviceKind) -> Box<dyn RawInputSource> {
    Box::new(LowLevelHook::new(kind))
}

/// Returns a `WindowsKeySimulator` backed by `SendInput`.
pub fn create_key_simulator() -> Result<Box<dyn KeySimulator>, InputError> {
    Ok(Box::new(WindowsKeySimulator::new()))
}
