//! Key sequence listener.
//!
//! Remembers the last `MAX_SEQUENCE_LENGTH` key-downs and fires every
//! subscription whose sequence equals the tail of that history. Matching is a
//! contiguous suffix match: `[W, A, S, D]` fires on `... W A S D`, never on
//! `W A x S D`. Key-ups are ignored and sequences are not debounced.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::device::{Device, Registry};
use crate::error::InputError;
use crate::event::{DeviceKind, Key, RawEvent};
use crate::interceptor::{Interceptor, InterceptorKind, InterceptorResponse};
use crate::listener::Attachment;
use crate::subscription::{Subscription, SubscriptionId, SubscriptionSet};

pub const MIN_SEQUENCE_LENGTH: usize = 2;
pub const MAX_SEQUENCE_LENGTH: usize = 10;

pub type SequenceCallback = dyn Fn() + Send + Sync;

pub type SequenceSubscription = Subscription<Vec<Key>, SequenceCallback>;

impl<C: ?Sized> Subscription<Vec<Key>, C> {
    pub fn sequence(&self) -> &[Key] {
        self.trigger()
    }
}

fn check_length(sequence: &[Key]) -> Result<(), InputError> {
    if (MIN_SEQUENCE_LENGTH..=MAX_SEQUENCE_LENGTH).contains(&sequence.len()) {
        Ok(())
    } else {
        Err(InputError::SequenceLength {
            len: sequence.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Interceptor
// ---------------------------------------------------------------------------

struct SequenceCore {
    subscriptions: SubscriptionSet<Vec<Key>, SequenceCallback>,
    pressed: Mutex<VecDeque<Key>>,
}

impl SequenceCore {
    /// Records `key` and returns the resulting history, oldest first.
    fn record(&self, key: Key) -> Vec<Key> {
        let mut pressed = self.lock_pressed();
        if pressed.len() == MAX_SEQUENCE_LENGTH {
            pressed.pop_front();
        }
        pressed.push_back(key);
        pressed.iter().copied().collect()
    }

    fn on_key_down(&self, key: Key) {
        let history = self.record(key);
        let matched = self
            .subscriptions
            .matching(|sequence| history.ends_with(sequence));

        for subscription in matched {
            if subscription.is_single_use() {
                self.subscriptions.remove_id(subscription.id());
            }
            log::debug!("sequence: {} matched {:?}", subscription.id(), subscription.sequence());
            (subscription.callback())();
        }
    }

    fn lock_pressed(&self) -> MutexGuard<'_, VecDeque<Key>> {
        self.pressed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Interceptor for SequenceCore {
    fn name(&self) -> &'static str {
        "sequence listener"
    }

    fn on_input(self: Arc<Self>, event: &RawEvent) -> InterceptorResponse {
        match *event {
            RawEvent::Key(event) if event.is_down() => {
                InterceptorResponse::handle(InterceptorKind::SequenceDetector, move || {
                    self.on_key_down(event.key)
                })
            }
            _ => InterceptorResponse::ignore(InterceptorKind::SequenceDetector),
        }
    }

    fn unhook_requested(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Keys typed while unhooked were never recorded; the history has a gap.
    fn reset(&self) {
        self.lock_pressed().clear();
    }
}

// ---------------------------------------------------------------------------
// Public listener
// ---------------------------------------------------------------------------

/// Registers callbacks for ordered key sequences typed consecutively.
pub struct SequenceListener {
    core: Arc<SequenceCore>,
    attachment: Attachment,
}

impl SequenceListener {
    /// Listener on the process-wide keyboard hook.
    pub fn new() -> Self {
        Self::with_device(Registry::global().keyboard().clone())
    }

    pub fn with_device(device: Arc<Device>) -> Self {
        let core = Arc::new(SequenceCore {
            subscriptions: SubscriptionSet::new(),
            pressed: Mutex::new(VecDeque::with_capacity(MAX_SEQUENCE_LENGTH)),
        });
        let attachment = Attachment::new(device, DeviceKind::Keyboard, core.clone());
        Self { core, attachment }
    }

    /// Calls `callback` every time `sequence` is typed.
    ///
    /// Fails with `InputError::SequenceLength` unless the sequence has
    /// between 2 and 10 keys; nothing is registered in that case.
    ///
    /// `interval` is recorded on the subscription but never enforced: a
    /// completed sequence always fires.
    pub fn subscribe(
        &self,
        sequence: impl IntoIterator<Item = Key>,
        callback: impl Fn() + Send + Sync + 'static,
        interval: Option<Duration>,
    ) -> Result<Arc<SequenceSubscription>, InputError> {
        self.add(
            sequence.into_iter().collect(),
            Arc::new(callback),
            interval.unwrap_or_default(),
            false,
        )
    }

    /// Calls `callback` the next time `sequence` is typed, then forgets it.
    pub fn subscribe_once(
        &self,
        sequence: impl IntoIterator<Item = Key>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<Arc<SequenceSubscription>, InputError> {
        self.add(sequence.into_iter().collect(), Arc::new(callback), Duration::ZERO, true)
    }

    pub fn unsubscribe_id(&self, id: SubscriptionId) {
        if self.core.subscriptions.remove_id(id) {
            self.attachment.release();
        }
    }

    /// Removes every subscription and forgets the typed history.
    pub fn unsubscribe_all(&self) {
        let removed = self.core.subscriptions.clear();
        self.core.lock_pressed().clear();
        if removed > 0 {
            self.attachment.release();
        }
    }

    pub fn is_listening(&self) -> bool {
        !self.core.subscriptions.is_empty()
    }

    pub fn subscriptions(&self) -> Vec<Arc<SequenceSubscription>> {
        self.core.subscriptions.snapshot()
    }

    /// Key-downs currently remembered, oldest first.
    pub fn recent_keys(&self) -> Vec<Key> {
        self.core.lock_pressed().iter().copied().collect()
    }

    /// Tears the listener down now instead of at the end of its scope.
    pub fn dispose(self) {}

    fn add(
        &self,
        sequence: Vec<Key>,
        callback: Arc<SequenceCallback>,
        interval: Duration,
        single_use: bool,
    ) -> Result<Arc<SequenceSubscription>, InputError> {
        check_length(&sequence)?;
        let subscription = self.attachment.register(
            &self.core.subscriptions,
            Subscription::new(sequence, callback, interval, single_use),
        )?;
        log::debug!(
            "sequence: subscribed {} to {:?}",
            subscription.id(),
            subscription.sequence()
        );
        Ok(subscription)
    }
}

impl Default for SequenceListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SequenceListener {
    fn drop(&mut self) {
        self.core.subscriptions.clear();
        self.core.lock_pressed().clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
