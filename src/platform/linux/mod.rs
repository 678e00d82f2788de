//! Linux platform backend.
//!
//! Capture: direct evdev (/dev/input/event*) via `EvdevSource`, one per
//! device kind. Injection: a uinput virtual keyboard via `UinputKeySimulator`.
//! Neither depends on the display server.

mod capture;
mod executor;
mod keycodes;

use capture::EvdevSource;
use executor::UinputKeySimulator;

use crate::error::InputError;
use crate::event::DeviceKind;
use crate::platform::{KeySimulator, RawInputSource};

/// Returns the evdev source for `kind`. Devices are opened on `hook()`.
///
/// Requires the process user to be in the `input` group.
pub fn create_input_source(kind: DeviceKind) -> Box<dyn RawInputSource> {
    Box::new(EvdevSource::new(kind))
}

/// Returns a uinput-backed key simulator.
pub fn create_key_simulator() -> Result<Box<dyn KeySimulator>, InputError> {
    UinputKeySimulator::new().map(|s| Box::new(s) as Box<dyn KeySimulator>)
}
