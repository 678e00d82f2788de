//! Platform abstraction layer.
//!
//! Defines the `RawInputSource` and `KeySimulator` traits. A `RawInputSource`
//! owns exactly one OS-level hook for one device kind; a `Device` decides when
//! it is installed and removed. Platform-specific implementations live in
//! child modules; `ManualSource` is an in-memory source for tests and for
//! embedders that feed events themselves.

#[cfg(target_os = "linux")]
mod linux;
mod manual;
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
mod unsupported;
#[cfg(target_os = "windows")]
mod windows;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub use manual::ManualSource;

use crate::error::InputError;
use crate::event::{Coordinates, DeviceKind, Key, RawEvent};
use crate::interceptor::Verdict;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Receives every event a hooked source observes and answers whether the OS
/// should still process it. Called on the source's delivery thread.
pub type EventSink = Arc<dyn Fn(&RawEvent) -> Verdict + Send + Sync>;

/// Reads the current pointer position without going through the `Device`.
pub type PointerReader = Arc<dyn Fn() -> Result<Coordinates, InputError> + Send + Sync>;

/// One OS-level low-level input hook.
///
/// `hook` and `unhook` are only ever called by the owning `Device`, serialized
/// under its lifecycle lock. Neither may wait for the delivery thread: a
/// callback running on it can be blocked on that same lock. `unhook` hands
/// the thread back instead and the `Device` joins it once the lock is free.
pub trait RawInputSource: Send {
    /// Device kind this source delivers events for.
    fn kind(&self) -> DeviceKind;

    /// Installs the hook and starts delivering events into `sink`.
    fn hook(&mut self, sink: EventSink) -> Result<(), InputError>;

    /// Removes the hook. Calling it while not hooked is a no-op.
    fn unhook(&mut self) -> Result<RetiredThread, InputError>;

    /// Pointer position lookup. Only meaningful for mouse sources.
    fn pointer(&self) -> PointerReader {
        let kind = self.kind();
        Arc::new(move || {
            Err(InputError::Unavailable(format!(
                "{kind} source does not track a pointer position"
            )))
        })
    }
}

/// Delivery thread of a removed hook, still finishing its last event.
#[must_use = "the delivery thread must be joined"]
#[derive(Debug, Default)]
pub struct RetiredThread(Option<JoinHandle<()>>);

impl RetiredThread {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(Some(handle))
    }

    /// Waits for the thread to exit. A thread retiring itself (an unhook from
    /// inside its own callback) is detached instead.
    pub fn join(self) {
        let Some(handle) = self.0 else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        let name = handle.thread().name().unwrap_or("unnamed").to_owned();
        if handle.join().is_err() {
            log::warn!("platform: delivery thread {name} panicked");
        }
    }
}

/// Synthesizes key presses.
pub trait KeySimulator: Send + Sync {
    /// Presses and releases `key`.
    fn press(&self, key: Key) -> Result<(), InputError>;

    /// Presses every key in order, then releases them in reverse order.
    fn press_combination(&self, keys: &[Key]) -> Result<(), InputError>;

    /// Whether `key` is physically held right now, hooked or not.
    fn is_key_pressed(&self, key: Key) -> Result<bool, InputError>;
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Returns the hook backend for `kind` on this platform.
#[cfg(target_os = "windows")]
pub fn create_input_source(kind: DeviceKind) -> Box<dyn RawInputSource> {
    windows::create_input_source(kind)
}

/// Returns the hook backend for `kind` on this platform.
#[cfg(target_os = "linux")]
pub fn create_input_source(kind: DeviceKind) -> Box<dyn RawInputSource> {
    linux::create_input_source(kind)
}

/// Returns the hook backend for `kind` on this platform.
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub fn create_input_source(kind: DeviceKind) -> Box<dyn RawInputSource> {
    Box::new(unsupported::UnsupportedSource::new(kind))
}

/// Returns the key injection backend for this platform.
#[cfg(target_os = "windows")]
pub fn create_key_simulator() -> Result<Box<dyn KeySimulator>, InputError> {
    windows::create_key_simulator()
}

/// Returns the key injection backend for this platform.
#[cfg(target_os = "linux")]
pub fn create_key_simulator() -> Result<Box<dyn KeySimulator>, InputError> {
    linux::create_key_simulator()
}

/// Returns the key injection backend for this platform.
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub fn create_key_simulator() -> Result<Box<dyn KeySimulator>, InputError> {
    Err(InputError::Unavailable(
        "key simulation is not supported on this platform".into(),
    ))
}
