//! Fallback source for targets without a hook backend.

use crate::error::InputError;
use crate::event::DeviceKind;
use crate::platform::{EventSink, RawInputSource, RetiredThread};

/// Always refuses to hook.
pub struct UnsupportedSource {
    kind: DeviceKind,
}

impl UnsupportedSource {
    pub fn new(kind: DeviceKind) -> Self {
        Self { kind }
    }
}

impl RawInputSource for UnsupportedSource {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn hook(&mut self, _sink: EventSink) -> Result<(), InputError> {
        Err(InputError::hook_install(
            self.kind,
            "no low-level hook backend for this platform",
        ))
    }

    fn unhook(&mut self) -> Result<RetiredThread, InputError> {
        Ok(RetiredThread::none())
    }
}
