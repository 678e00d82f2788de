//! Subscriptions and the collection listeners keep them in.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Identifier
// ---------------------------------------------------------------------------

/// Process-unique subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SubscriptionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A registered trigger with its callback and invocation policy.
///
/// `T` is the trigger (key, combination, mouse event, key sequence) and `C`
/// the callback type. Both are fixed at creation; only the time of the last
/// invocation changes.
pub struct Subscription<T, C: ?Sized> {
    id: SubscriptionId,
    trigger: T,
    callback: Arc<C>,
    interval: Duration,
    single_use: bool,
    last_invoked: Mutex<Option<Instant>>,
}

impl<T, C: ?Sized> Subscription<T, C> {
    pub(crate) fn new(trigger: T, callback: Arc<C>, interval: Duration, single_use: bool) -> Self {
        Self {
            id: SubscriptionId::next(),
            trigger,
            callback,
            interval,
            single_use,
            last_invoked: Mutex::new(None),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn trigger(&self) -> &T {
        &self.trigger
    }

    /// Minimum spacing between invocations; zero means unthrottled.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_single_use(&self) -> bool {
        self.single_use
    }

    pub fn last_invoked(&self) -> Option<Instant> {
        *self.lock_last_invoked()
    }

    pub(crate) fn callback(&self) -> &C {
        &self.callback
    }

    /// Claims an invocation at `now`.
    ///
    /// Returns false when the previous invocation is less than `interval`
    /// ago; the event is then dropped, never deferred. On success the
    /// invocation time is recorded before the callback runs.
    pub(crate) fn try_claim(&self, now: Instant) -> bool {
        let mut last = self.lock_last_invoked();
        if !self.interval.is_zero() {
            if let Some(previous) = *last {
                if now.saturating_duration_since(previous) < self.interval {
                    return false;
                }
            }
        }
        *last = Some(now);
        true
    }

    fn lock_last_invoked(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_invoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: fmt::Debug, C: ?Sized> fmt::Debug for Subscription<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("interval", &self.interval)
            .field("single_use", &self.single_use)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Insertion-ordered subscriptions, shared between the caller's thread and
/// the delivery thread.
///
/// Readers get cloned snapshots; nothing outside this type ever iterates the
/// live list, so callbacks may add or remove subscriptions freely.
pub(crate) struct SubscriptionSet<T, C: ?Sized> {
    items: Mutex<Vec<Arc<Subscription<T, C>>>>,
}

impl<T, C: ?Sized> SubscriptionSet<T, C> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, subscription: Arc<Subscription<T, C>>) {
        self.lock().push(subscription);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn snapshot(&self) -> Vec<Arc<Subscription<T, C>>> {
        self.lock().clone()
    }

    /// Snapshot of the subscriptions for which `matches` holds, in order.
    pub fn matching(&self, mut matches: impl FnMut(&T) -> bool) -> Vec<Arc<Subscription<T, C>>> {
        self.lock()
            .iter()
            .filter(|s| matches(&s.trigger))
            .cloned()
            .collect()
    }

    /// Removes the subscription with `id`. Returns whether it was present.
    pub fn remove_id(&self, id: SubscriptionId) -> bool {
        let mut items = self.lock();
        match items.iter().position(|s| s.id == id) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every subscription whose trigger satisfies `matches`.
    pub fn remove_where(&self, mut matches: impl FnMut(&T) -> bool) -> usize {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|s| !matches(&s.trigger));
        before - items.len()
    }

    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        let removed = items.len();
        items.clear();
        removed
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Subscription<T, C>>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
