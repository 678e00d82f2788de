//! Keyboard listener: single keys and key combinations.
//!
//! Subscriptions fire on key-down. A single-key trigger fires whenever its key
//! goes down; a combination fires on the key-down that makes the set of held
//! keys exactly equal to the combination. Key-ups only update the held set.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::device::{Device, Registry};
use crate::error::InputError;
use crate::event::{DeviceKind, Key, KeyEvent, KeyState, RawEvent};
use crate::interceptor::{Interceptor, InterceptorKind, InterceptorResponse};
use crate::listener::Attachment;
use crate::subscription::{Subscription, SubscriptionId, SubscriptionSet};

/// Keyboard callbacks receive the key that fired them.
pub type KeyCallback = dyn Fn(Key) + Send + Sync;

pub type KeySubscription = Subscription<KeyTrigger, KeyCallback>;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// What a keyboard subscription waits for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyTrigger {
    Key(Key),
    /// Keys held down together; order of pressing does not matter.
    Combination(BTreeSet<Key>),
}

impl KeyTrigger {
    /// Builds a combination trigger. A single distinct key collapses to `Key`;
    /// an empty one is rejected when subscribed.
    pub fn combination(keys: impl IntoIterator<Item = Key>) -> Self {
        let keys: BTreeSet<Key> = keys.into_iter().collect();
        if keys.len() == 1 {
            if let Some(&key) = keys.iter().next() {
                return KeyTrigger::Key(key);
            }
        }
        KeyTrigger::Combination(keys)
    }

    fn matches(&self, pressed: Key, held: &BTreeSet<Key>) -> bool {
        match self {
            KeyTrigger::Key(key) => *key == pressed,
            KeyTrigger::Combination(keys) => keys.contains(&pressed) && keys == held,
        }
    }
}

impl From<Key> for KeyTrigger {
    fn from(key: Key) -> Self {
        KeyTrigger::Key(key)
    }
}

// ---------------------------------------------------------------------------
// Interceptor
// ---------------------------------------------------------------------------

struct KeyboardCore {
    subscriptions: SubscriptionSet<KeyTrigger, KeyCallback>,
    held: Mutex<BTreeSet<Key>>,
}

impl KeyboardCore {
    fn dispatch(&self, event: KeyEvent) {
        let held = {
            let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
            match event.state {
                KeyState::Down => {
                    held.insert(event.key);
                }
                KeyState::Up => {
                    held.remove(&event.key);
                    return;
                }
            }
            held.clone()
        };

        let matched = self
            .subscriptions
            .matching(|trigger| trigger.matches(event.key, &held));

        for subscription in matched {
            if !subscription.try_claim(event.timestamp) {
                log::trace!("keyboard: {} throttled", subscription.id());
                continue;
            }
            if subscription.is_single_use() {
                self.subscriptions.remove_id(subscription.id());
            }
            (subscription.callback())(event.key);
        }
    }
}

impl Interceptor for KeyboardCore {
    fn name(&self) -> &'static str {
        "keyboard listener"
    }

    fn on_input(self: Arc<Self>, event: &RawEvent) -> InterceptorResponse {
        let RawEvent::Key(event) = *event else {
            return InterceptorResponse::ignore(InterceptorKind::Listener);
        };
        InterceptorResponse::handle(InterceptorKind::Listener, move || self.dispatch(event))
    }

    fn unhook_requested(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Key-ups made while unhooked were never seen.
    fn reset(&self) {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// ---------------------------------------------------------------------------
// Public listener
// ---------------------------------------------------------------------------

/// Registers callbacks for keys and key combinations.
///
/// The keyboard hook is shared with every other keyboard interceptor on the
/// same device. Dropping the listener (or calling `dispose`) removes all of
/// its subscriptions and gives up its hook interest.
pub struct KeyboardListener {
    core: Arc<KeyboardCore>,
    attachment: Attachment,
}

impl KeyboardListener {
    /// Listener on the process-wide keyboard hook.
    pub fn new() -> Self {
        Self::with_device(Registry::global().keyboard().clone())
    }

    pub fn with_device(device: Arc<Device>) -> Self {
        let core = Arc::new(KeyboardCore {
            subscriptions: SubscriptionSet::new(),
            held: Mutex::new(BTreeSet::new()),
        });
        let attachment = Attachment::new(device, DeviceKind::Keyboard, core.clone());
        Self { core, attachment }
    }

    /// Calls `callback` on every matching key-down, at most once per `interval`.
    pub fn subscribe(
        &self,
        trigger: impl Into<KeyTrigger>,
        callback: impl Fn(Key) + Send + Sync + 'static,
        interval: Option<Duration>,
    ) -> Result<Arc<KeySubscription>, InputError> {
        self.add(trigger.into(), Arc::new(callback), interval.unwrap_or_default(), false)
    }

    /// Calls `callback` on the next matching key-down only.
    pub fn subscribe_once(
        &self,
        trigger: impl Into<KeyTrigger>,
        callback: impl Fn(Key) + Send + Sync + 'static,
    ) -> Result<Arc<KeySubscription>, InputError> {
        self.add(trigger.into(), Arc::new(callback), Duration::ZERO, true)
    }

    /// Subscribes `callback` to each key individually.
    ///
    /// Every key gets its own subscription, so the keys can later be
    /// unsubscribed one at a time.
    pub fn subscribe_many(
        &self,
        keys: impl IntoIterator<Item = Key>,
        callback: impl Fn(Key) + Send + Sync + 'static,
        interval: Option<Duration>,
    ) -> Result<Vec<Arc<KeySubscription>>, InputError> {
        let callback: Arc<KeyCallback> = Arc::new(callback);
        let interval = interval.unwrap_or_default();
        keys.into_iter()
            .map(|key| self.add(KeyTrigger::Key(key), callback.clone(), interval, false))
            .collect()
    }

    /// Subscribes `callback` to the keys being held down together.
    ///
    /// Fails with `InputError::EmptyCombination` when `keys` is empty.
    pub fn subscribe_combination(
        &self,
        keys: impl IntoIterator<Item = Key>,
        callback: impl Fn(Key) + Send + Sync + 'static,
        interval: Option<Duration>,
    ) -> Result<Arc<KeySubscription>, InputError> {
        self.subscribe(KeyTrigger::combination(keys), callback, interval)
    }

    /// Removes every subscription whose trigger equals `trigger`.
    pub fn unsubscribe(&self, trigger: impl Into<KeyTrigger>) {
        let trigger = trigger.into();
        if self.core.subscriptions.remove_where(|t| *t == trigger) > 0 {
            self.attachment.release();
        }
    }

    /// Removes the subscription with `id`; unknown ids are ignored.
    pub fn unsubscribe_id(&self, id: SubscriptionId) {
        if self.core.subscriptions.remove_id(id) {
            self.attachment.release();
        }
    }

    pub fn unsubscribe_all(&self) {
        if self.core.subscriptions.clear() > 0 {
            self.attachment.release();
        }
    }

    /// Removes every subscription whose trigger is one of `triggers`.
    pub fn unsubscribe_all_of<T: Into<KeyTrigger>>(&self, triggers: impl IntoIterator<Item = T>) {
        let triggers: Vec<KeyTrigger> = triggers.into_iter().map(Into::into).collect();
        if triggers.is_empty() {
            return;
        }
        if self.core.subscriptions.remove_where(|t| triggers.contains(t)) > 0 {
            self.attachment.release();
        }
    }

    pub fn is_listening(&self) -> bool {
        !self.core.subscriptions.is_empty()
    }

    pub fn subscriptions(&self) -> Vec<Arc<KeySubscription>> {
        self.core.subscriptions.snapshot()
    }

    pub fn device(&self) -> &Arc<Device> {
        self.attachment.device()
    }

    /// Tears the listener down now instead of at the end of its scope.
    pub fn dispose(self) {}

    fn add(
        &self,
        trigger: KeyTrigger,
        callback: Arc<KeyCallback>,
        interval: Duration,
        single_use: bool,
    ) -> Result<Arc<KeySubscription>, InputError> {
        if matches!(&trigger, KeyTrigger::Combination(keys) if keys.is_empty()) {
            return Err(InputError::EmptyCombination);
        }
        let subscription = self.attachment.register(
            &self.core.subscriptions,
            Subscription::new(trigger, callback, interval, single_use),
        )?;
        log::debug!(
            "keyboard: subscribed {} to {:?}",
            subscription.id(),
            subscription.trigger()
        );
        Ok(subscription)
    }
}

impl Default for KeyboardListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.core.subscriptions.clear();
        // `attachment` detaches right after this and releases the hook.
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::Verdict;
    use crate::platform::ManualSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn setup() -> (ManualSource, KeyboardListener) {
        let source = ManualSource::keyboard();
        let listener = KeyboardListener::with_device(Device::new(Box::new(source.clone())));
        (source, listener)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(Key) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        (count, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn tap(source: &ManualSource, key: Key) {
        source.emit(KeyEvent::down(key));
        source.emit(KeyEvent::up(key));
    }

    #[test]
    fn subscribe_then_unsubscribe_key_stops_listening() {
        let (source, listener) = setup();
        listener.subscribe(Key::A, |_| {}, None).unwrap();
        assert!(listener.is_listening());
        assert!(source.is_hooked());

        listener.unsubscribe(Key::A);
        assert!(!listener.is_listening());
        assert!(!source.is_hooked());
    }

    #[test]
    fn subscribe_then_unsubscribe_all_stops_listening() {
        let (source, listener) = setup();
        listener.subscribe(Key::A, |_| {}, None).unwrap();
        listener.unsubscribe_all();
        assert!(!listener.is_listening());
        assert!(!source.is_hooked());
    }

    #[test]
    fn subscribe_many_then_unsubscribe_all_of_stops_listening() {
        let (source, listener) = setup();
        let keys = [Key::W, Key::A, Key::S, Key::D];
        listener.subscribe_many(keys, |_| {}, None).unwrap();
        assert_eq!(listener.subscriptions().len(), 4);
        listener.unsubscribe_all_of(keys);
        assert!(!listener.is_listening());
        assert!(!source.is_hooked());
    }

    #[test]
    fn subscribe_many_then_unsubscribe_each_key_stops_listening() {
        let (source, listener) = setup();
        listener
            .subscribe_many([Key::W, Key::A, Key::S, Key::D], |_| {}, None)
            .unwrap();
        for key in [Key::D, Key::S, Key::A] {
            listener.unsubscribe(key);
            assert!(listener.is_listening());
        }
        listener.unsubscribe(Key::W);
        assert!(!listener.is_listening());
        assert!(!source.is_hooked());
    }

    #[test]
    fn mixed_subscriptions_then_unsubscribe_all_stops_listening() {
        let (source, listener) = setup();
        listener
            .subscribe_many([Key::W, Key::A, Key::S, Key::D], |_| {}, None)
            .unwrap();
        listener.subscribe(Key::A, |_| {}, None).unwrap();
        listener.unsubscribe_all();
        assert!(!listener.is_listening());
        assert!(!source.is_hooked());
    }

    #[test]
    fn unsubscribe_all_on_empty_listener_is_noop() {
        let (source, listener) = setup();
        listener.unsubscribe_all();
        listener.unsubscribe_all_of(Vec::<Key>::new());
        assert!(!listener.is_listening());
        assert_eq!(source.hook_calls(), 0);
    }

    #[test]
    fn idle_listener_never_hooks() {
        let (source, listener) = setup();
        assert!(!listener.is_listening());
        drop(listener);
        assert_eq!(source.hook_calls(), 0);
    }

    #[test]
    fn unsubscribe_unknown_id_is_noop() {
        let (_source, listener) = setup();
        let kept = listener.subscribe(Key::A, |_| {}, None).unwrap();
        let other = setup().1.subscribe(Key::B, |_| {}, None).unwrap();
        listener.unsubscribe_id(other.id());
        assert_eq!(listener.subscriptions()[0].id(), kept.id());
    }

    #[test]
    fn callback_receives_pressed_key_on_key_down_only() {
        let (source, listener) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        listener
            .subscribe(Key::Q, move |key| sink.lock().unwrap().push(key), None)
            .unwrap();

        source.emit(KeyEvent::up(Key::Q));
        assert!(seen.lock().unwrap().is_empty());
        source.emit(KeyEvent::down(Key::Q));
        assert_eq!(*seen.lock().unwrap(), vec![Key::Q]);
    }

    #[test]
    fn listener_never_suppresses() {
        let (source, listener) = setup();
        listener.subscribe(Key::A, |_| {}, None).unwrap();
        assert_eq!(source.emit(KeyEvent::down(Key::A)), Some(Verdict::Propagate));
    }

    #[test]
    fn single_use_fires_once_and_releases_hook() {
        let (source, listener) = setup();
        let (count, callback) = counter();
        let subscription = listener.subscribe_once(Key::A, callback).unwrap();
        assert!(subscription.is_single_use());

        tap(&source, Key::A);
        tap(&source, Key::A);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!listener.is_listening());
        assert!(!source.is_hooked());
        assert_eq!(source.unhook_calls(), 1);
    }

    #[test]
    fn all_matching_single_use_subscriptions_are_removed() {
        let (source, listener) = setup();
        let (count, callback) = counter();
        let callback = Arc::new(callback);
        let (first, second) = (callback.clone(), callback.clone());
        listener.subscribe_once(Key::A, move |k| first(k)).unwrap();
        listener.subscribe_once(Key::A, move |k| second(k)).unwrap();
        listener.subscribe(Key::B, |_| {}, None).unwrap();

        source.emit(KeyEvent::down(Key::A));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(listener.subscriptions().len(), 1);
        assert!(source.is_hooked());
    }

    #[test]
    fn debounce_drops_presses_inside_interval() {
        let (source, listener) = setup();
        let (count, callback) = counter();
        listener
            .subscribe(Key::Space, callback, Some(Duration::from_millis(200)))
            .unwrap();

        let start = Instant::now();
        source.emit(KeyEvent::at(Key::Space, KeyState::Down, start));
        source.emit(KeyEvent::at(
            Key::Space,
            KeyState::Down,
            start + Duration::from_millis(150),
        ));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        source.emit(KeyEvent::at(
            Key::Space,
            KeyState::Down,
            start + Duration::from_millis(200),
        ));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn combination_fires_when_exact_set_is_held() {
        let (source, listener) = setup();
        let (count, callback) = counter();
        listener
            .subscribe_combination([Key::Ctrl, Key::Shift, Key::T], callback, None)
            .unwrap();

        source.emit(KeyEvent::down(Key::Ctrl));
        source.emit(KeyEvent::down(Key::Shift));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        source.emit(KeyEvent::down(Key::T));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // An extra held key breaks the exact match.
        source.emit(KeyEvent::up(Key::T));
        source.emit(KeyEvent::down(Key::Alt));
        source.emit(KeyEvent::down(Key::T));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn combination_is_unsubscribed_by_equal_trigger() {
        let (source, listener) = setup();
        listener
            .subscribe_combination([Key::Ctrl, Key::C], |_| {}, None)
            .unwrap();
        listener.unsubscribe(KeyTrigger::combination([Key::C, Key::Ctrl]));
        assert!(!listener.is_listening());
        assert!(!source.is_hooked());
    }

    #[test]
    fn single_key_combination_collapses_to_key() {
        assert_eq!(
            KeyTrigger::combination([Key::A, Key::A]),
            KeyTrigger::Key(Key::A)
        );
    }

    #[test]
    fn callback_may_unsubscribe_another_subscription() {
        let source = ManualSource::keyboard();
        let listener = Arc::new(KeyboardListener::with_device(Device::new(Box::new(
            source.clone(),
        ))));
        let (count, callback) = counter();
        let victim = listener.subscribe(Key::A, callback, None).unwrap();

        let weak = Arc::downgrade(&listener);
        let victim_id = victim.id();
        listener
            .subscribe(
                Key::A,
                move |_| {
                    if let Some(listener) = weak.upgrade() {
                        listener.unsubscribe_id(victim_id);
                    }
                },
                None,
            )
            .unwrap();

        // Both were in the snapshot for this event.
        source.emit(KeyEvent::down(Key::A));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        source.emit(KeyEvent::down(Key::A));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(listener.subscriptions().len(), 1);
    }

    #[test]
    fn two_listeners_share_one_hook() {
        let source = ManualSource::keyboard();
        let device = Device::new(Box::new(source.clone()));
        let first = KeyboardListener::with_device(device.clone());
        let second = KeyboardListener::with_device(device.clone());

        first.subscribe(Key::A, |_| {}, None).unwrap();
        second.subscribe(Key::B, |_| {}, None).unwrap();
        assert_eq!(source.hook_calls(), 1);

        first.unsubscribe_all();
        assert!(source.is_hooked());
        second.unsubscribe_all();
        assert!(!source.is_hooked());
    }

    #[test]
    fn dropping_listener_releases_hook() {
        let (source, listener) = setup();
        listener.subscribe(Key::A, |_| {}, None).unwrap();
        let device = listener.device().clone();
        listener.dispose();
        assert!(!source.is_hooked());
        assert_eq!(device.interceptor_count(), 0);
    }

    #[test]
    fn failed_hook_rolls_back_subscription() {
        let (source, listener) = setup();
        source.fail_next_hook();
        let err = listener.subscribe(Key::A, |_| {}, None).unwrap_err();
        assert!(matches!(err, InputError::HookInstall { .. }));
        assert!(!listener.is_listening());

        listener.subscribe(Key::A, |_| {}, None).unwrap();
        assert!(source.is_hooked());
    }

    #[test]
    fn keys_released_while_unhooked_do_not_stay_held() {
        let (source, listener) = setup();
        let (copies, copy) = counter();
        listener
            .subscribe_once(KeyTrigger::combination([Key::Ctrl, Key::C]), copy)
            .unwrap();
        source.emit(KeyEvent::down(Key::Ctrl));
        source.emit(KeyEvent::down(Key::C));
        assert_eq!(copies.load(Ordering::SeqCst), 1);
        assert!(!source.is_hooked());

        // Nobody hears these.
        assert_eq!(source.emit(KeyEvent::up(Key::C)), None);
        assert_eq!(source.emit(KeyEvent::up(Key::Ctrl)), None);

        let (pastes, paste) = counter();
        listener
            .subscribe_combination([Key::Ctrl, Key::V], paste, None)
            .unwrap();
        source.emit(KeyEvent::down(Key::Ctrl));
        source.emit(KeyEvent::down(Key::V));
        assert_eq!(pastes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_combination_is_rejected() {
        let (source, listener) = setup();
        let err = listener
            .subscribe_combination(Vec::<Key>::new(), |_| {}, None)
            .unwrap_err();
        assert!(matches!(err, InputError::EmptyCombination));
        assert!(!listener.is_listening());
        assert_eq!(source.hook_calls(), 0);
        assert!(listener.subscribe_many(Vec::<Key>::new(), |_| {}, None).unwrap().is_empty());
    }
}
