//! Hook ownership per device kind.
//!
//! A `Device` is the only thing allowed to install or remove a source's hook.
//! Interceptors attach to it; the hook goes in on the first `hook()` and comes
//! out once every attached interceptor reports `unhook_requested()`.
//!
//! Locking:
//!   `interceptors` is held only long enough to clone or edit the list.
//!   `lifecycle` serializes install / removal and nothing else; `is_hooked()`
//!   and `position()` never touch it. The delivery thread never blocks on it:
//!   it raises `release_pending` and `try_lock`s. Whoever holds the lock
//!   drains `release_pending` before and after dropping it, so a release
//!   request is never lost. The retired delivery thread is joined only after
//!   the lock is dropped, so a callback still running on it can take the lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, TryLockError, Weak};

use crate::error::InputError;
use crate::event::{Coordinates, DeviceKind, RawEvent};
use crate::interceptor::{Interceptor, Pipeline, Verdict};
use crate::platform::{self, EventSink, PointerReader, RawInputSource, RetiredThread};

/// Handle returned by `Device::attach`, used to detach again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(u64);

pub struct Device {
    kind: DeviceKind,
    interceptors: Mutex<Vec<(InterceptorId, Arc<dyn Interceptor>)>>,
    lifecycle: Mutex<Box<dyn RawInputSource>>,
    /// Written under `lifecycle`, read without it.
    hooked: AtomicBool,
    pointer: PointerReader,
    release_pending: AtomicBool,
    next_id: AtomicU64,
    weak_self: Weak<Device>,
}

impl Device {
    pub fn new(source: Box<dyn RawInputSource>) -> Arc<Self> {
        let kind = source.kind();
        let pointer = source.pointer();
        Arc::new_cyclic(|weak_self| Device {
            kind,
            interceptors: Mutex::new(Vec::new()),
            lifecycle: Mutex::new(source),
            hooked: AtomicBool::new(false),
            pointer,
            release_pending: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            weak_self: weak_self.clone(),
        })
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn is_hooked(&self) -> bool {
        self.hooked.load(Ordering::Acquire)
    }

    /// Number of attached interceptors.
    pub fn interceptor_count(&self) -> usize {
        self.lock_interceptors().len()
    }

    // -----------------------------------------------------------------------
    // Attachment
    // -----------------------------------------------------------------------

    /// Appends `interceptor` to the end of the dispatch order.
    ///
    /// Attaching does not install the hook; the interceptor calls `hook()`
    /// once it actually has something to listen for.
    pub fn attach(&self, interceptor: Arc<dyn Interceptor>) -> InterceptorId {
        let id = InterceptorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        log::debug!("device: {} attached {} ({:?})", self.kind, interceptor.name(), id);
        self.lock_interceptors().push((id, interceptor));
        id
    }

    /// Removes the interceptor and releases the hook if nobody else needs it.
    pub fn detach(&self, id: InterceptorId) {
        let removed = {
            let mut list = self.lock_interceptors();
            let before = list.len();
            list.retain(|(slot, _)| *slot != id);
            before != list.len()
        };
        if removed {
            log::debug!("device: {} detached {:?}", self.kind, id);
            self.release();
        }
    }

    // -----------------------------------------------------------------------
    // Hook lifecycle
    // -----------------------------------------------------------------------

    /// Installs the hook unless it is already installed.
    ///
    /// Every attached interceptor is `reset()` before a fresh install.
    /// Installation errors are returned as-is; nothing is retried.
    pub fn hook(&self) -> Result<(), InputError> {
        let result = {
            let mut source = self.lock_lifecycle();
            if self.is_hooked() {
                Ok(())
            } else {
                for interceptor in self.snapshot() {
                    interceptor.reset();
                }
                match source.hook(self.sink()) {
                    Ok(()) => {
                        self.hooked.store(true, Ordering::Release);
                        log::info!("device: {} hook installed", self.kind);
                        Ok(())
                    }
                    Err(e) => {
                        log::warn!("device: {} hook refused: {e}", self.kind);
                        Err(e)
                    }
                }
            }
        };
        // A release requested while we held the lock is ours to evaluate.
        self.settle();
        result
    }

    /// Removes the hook if every attached interceptor has lost interest.
    ///
    /// Safe to call from any thread, including the delivery thread in the
    /// middle of dispatch.
    pub fn release(&self) {
        self.release_pending.store(true, Ordering::Release);
        self.settle();
    }

    /// Current pointer position as reported by the source.
    pub fn position(&self) -> Result<Coordinates, InputError> {
        (self.pointer)()
    }

    fn settle(&self) {
        loop {
            let retired = match self.lifecycle.try_lock() {
                Ok(mut source) => self.drain_release_requests(&mut **source),
                Err(TryLockError::Poisoned(poisoned)) => {
                    let mut source = poisoned.into_inner();
                    self.drain_release_requests(&mut **source)
                }
                // The holder drains the flag when it is done.
                Err(TryLockError::WouldBlock) => return,
            };
            retired.join();
            if !self.release_pending.load(Ordering::Acquire) {
                return;
            }
        }
    }

    fn drain_release_requests(&self, source: &mut dyn RawInputSource) -> RetiredThread {
        let mut retired = RetiredThread::none();
        while self.release_pending.swap(false, Ordering::AcqRel) {
            if !self.is_hooked() || !self.unhook_requested() {
                continue;
            }
            match source.unhook() {
                Ok(thread) => {
                    retired = thread;
                    log::info!("device: {} hook released", self.kind);
                }
                Err(e) => log::warn!("device: {} unhook failed: {e}", self.kind),
            }
            self.hooked.store(false, Ordering::Release);
        }
        retired
    }

    fn unhook_requested(&self) -> bool {
        let snapshot = self.snapshot();
        snapshot.iter().all(|interceptor| interceptor.unhook_requested())
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Runs one raw event through every attached interceptor.
    pub fn handle(&self, event: &RawEvent) -> Verdict {
        let snapshot = self.snapshot();
        let mut pipeline = Pipeline::with_capacity(snapshot.len());
        for interceptor in snapshot {
            pipeline.push(interceptor.on_input(event));
        }
        let verdict = pipeline.run();
        self.release();
        verdict
    }

    fn sink(&self) -> EventSink {
        let device = self.weak_self.clone();
        Arc::new(move |event: &RawEvent| match device.upgrade() {
            Some(device) => device.handle(event),
            None => Verdict::Propagate,
        })
    }

    fn snapshot(&self) -> Vec<Arc<dyn Interceptor>> {
        self.lock_interceptors()
            .iter()
            .map(|(_, interceptor)| interceptor.clone())
            .collect()
    }

    fn lock_interceptors(&self) -> MutexGuard<'_, Vec<(InterceptorId, Arc<dyn Interceptor>)>> {
        self.interceptors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Box<dyn RawInputSource>> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// One `Device` per device kind.
///
/// Listeners built with `::new()` attach to `Registry::global()`, which is
/// backed by this platform's hook backends. Tests and embedders build their own
/// registry around other sources.
pub struct Registry {
    keyboard: Arc<Device>,
    mouse: Arc<Device>,
}

impl Registry {
    pub fn new(keyboard: Box<dyn RawInputSource>, mouse: Box<dyn RawInputSource>) -> Self {
        debug_assert_eq!(keyboard.kind(), DeviceKind::Keyboard);
        debug_assert_eq!(mouse.kind(), DeviceKind::Mouse);
        Self {
            keyboard: Device::new(keyboard),
            mouse: Device::new(mouse),
        }
    }

    /// Process-wide registry over the platform backends.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            Registry::new(
                platform::create_input_source(DeviceKind::Keyboard),
                platform::create_input_source(DeviceKind::Mouse),
            )
        })
    }

    pub fn device(&self, kind: DeviceKind) -> &Arc<Device> {
        match kind {
            DeviceKind::Keyboard => &self.keyboard,
            DeviceKind::Mouse => &self.mouse,
        }
    }

    pub fn keyboard(&self) -> &Arc<Device> {
        &self.keyboard
    }

    pub fn mouse(&self) -> &Arc<Device> {
        &self.mouse
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
