//! In-memory input source.
//!
//! `ManualSource` behaves like an OS hook that the caller drives by hand:
//! `emit()` delivers an event exactly as a backend's hook thread would, but on
//! the calling thread. Events emitted while unhooked are dropped, just as the
//! OS never reports input to a process that has no hook installed.
//!
//! The type is a cheap handle: clone it, give one clone to a `Device`, keep
//! the other to feed events and inspect hook activity.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::InputError;
use crate::event::{Coordinates, DeviceKind, RawEvent};
use crate::interceptor::Verdict;
use crate::platform::{EventSink, PointerReader, RawInputSource, RetiredThread};

#[derive(Clone)]
pub struct ManualSource {
    kind: DeviceKind,
    shared: Arc<Shared>,
}

struct Shared {
    sink: Mutex<Option<EventSink>>,
    position: Arc<Mutex<Coordinates>>,
    hook_calls: AtomicUsize,
    unhook_calls: AtomicUsize,
    fail_next_hook: AtomicBool,
}

impl ManualSource {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            shared: Arc::new(Shared {
                sink: Mutex::new(None),
                position: Arc::new(Mutex::new(Coordinates::default())),
                hook_calls: AtomicUsize::new(0),
                unhook_calls: AtomicUsize::new(0),
                fail_next_hook: AtomicBool::new(false),
            }),
        }
    }

    pub fn keyboard() -> Self {
        Self::new(DeviceKind::Keyboard)
    }

    pub fn mouse() -> Self {
        Self::new(DeviceKind::Mouse)
    }

    /// Delivers `event` to the installed sink.
    ///
    /// Returns `None` when no hook is installed (the event is never observed).
    pub fn emit(&self, event: impl Into<RawEvent>) -> Option<Verdict> {
        // Clone the sink out so the hook can be removed from inside dispatch.
        let sink = self
            .shared
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        Some(sink(&event.into()))
    }

    pub fn is_hooked(&self) -> bool {
        self.shared
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of successful `hook()` calls so far.
    pub fn hook_calls(&self) -> usize {
        self.shared.hook_calls.load(Ordering::SeqCst)
    }

    /// Number of `unhook()` calls that removed an installed hook.
    pub fn unhook_calls(&self) -> usize {
        self.shared.unhook_calls.load(Ordering::SeqCst)
    }

    /// Makes the next `hook()` call fail like an OS refusal would.
    pub fn fail_next_hook(&self) {
        self.shared.fail_next_hook.store(true, Ordering::SeqCst);
    }

    pub fn set_position(&self, position: Coordinates) {
        *self
            .shared
            .position
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = position;
    }
}

impl RawInputSource for ManualSource {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn hook(&mut self, sink: EventSink) -> Result<(), InputError> {
        if self.shared.fail_next_hook.swap(false, Ordering::SeqCst) {
            return Err(InputError::hook_install(self.kind, "install refused"));
        }
        let mut slot = self
            .shared
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(sink);
            self.shared.hook_calls.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn unhook(&mut self) -> Result<RetiredThread, InputError> {
        let removed = self
            .shared
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if removed.is_some() {
            self.shared.unhook_calls.fetch_add(1, Ordering::SeqCst);
        }
        Ok(RetiredThread::none())
    }

    fn pointer(&self) -> PointerReader {
        let position = self.shared.position.clone();
        let kind = self.kind;
        Arc::new(move || match kind {
            DeviceKind::Mouse => Ok(*position.lock().unwrap_or_else(PoisonError::into_inner)),
            DeviceKind::Keyboard => Err(InputError::Unavailable(
                "keyboard source does not track a pointer position".into(),
            )),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
