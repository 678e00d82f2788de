//! Key blocking and key press synthesis.
//!
//! `KeyboardManipulator` is the only `Simulation` interceptor: while a key is
//! prevented, both its down and up transitions are swallowed before the
//! focused application sees them. Other keyboard interceptors on the same
//! device still receive the event.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::device::{Device, Registry};
use crate::error::InputError;
use crate::event::{DeviceKind, Key, RawEvent};
use crate::interceptor::{Interceptor, InterceptorKind, InterceptorResponse};
use crate::listener::Attachment;
use crate::platform::{self, KeySimulator};

type KeyNotification = RwLock<Option<Arc<dyn Fn(Key) + Send + Sync>>>;

struct Blocker {
    locked: Mutex<BTreeSet<Key>>,
    on_prevented: KeyNotification,
    on_released: KeyNotification,
}

impl Blocker {
    fn lock(&self) -> MutexGuard<'_, BTreeSet<Key>> {
        self.locked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn notify(slot: &KeyNotification, key: Key) {
    let callback = slot.read().unwrap_or_else(PoisonError::into_inner).clone();
    if let Some(callback) = callback {
        callback(key);
    }
}

fn set(slot: &KeyNotification, callback: impl Fn(Key) + Send + Sync + 'static) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
}

impl Interceptor for Blocker {
    fn name(&self) -> &'static str {
        "key blocker"
    }

    fn on_input(self: Arc<Self>, event: &RawEvent) -> InterceptorResponse {
        let RawEvent::Key(event) = *event else {
            return InterceptorResponse::ignore(InterceptorKind::Simulation);
        };
        if !self.lock().contains(&event.key) {
            return InterceptorResponse::ignore(InterceptorKind::Simulation);
        }
        InterceptorResponse::handle(InterceptorKind::Simulation, move || {
            log::debug!("manipulator: blocked {:?} {:?}", event.key, event.state);
            if event.is_down() {
                notify(&self.on_prevented, event.key);
            }
        })
    }

    fn unhook_requested(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Blocks keys system-wide and synthesizes key presses.
pub struct KeyboardManipulator {
    blocker: Arc<Blocker>,
    simulator: Option<Box<dyn KeySimulator>>,
    attachment: Attachment,
}

impl KeyboardManipulator {
    /// Manipulator on the process-wide keyboard hook with this platform's
    /// key injection backend.
    ///
    /// A missing injection backend is not fatal here; `press` reports it.
    pub fn new() -> Self {
        let simulator = match platform::create_key_simulator() {
            Ok(simulator) => Some(simulator),
            Err(e) => {
                log::warn!("manipulator: key simulation unavailable: {e}");
                None
            }
        };
        Self::with_device(Registry::global().keyboard().clone(), simulator)
    }

    /// Manipulator on `device`. Without a simulator it can only block keys.
    pub fn with_device(device: Arc<Device>, simulator: Option<Box<dyn KeySimulator>>) -> Self {
        let blocker = Arc::new(Blocker {
            locked: Mutex::new(BTreeSet::new()),
            on_prevented: RwLock::new(None),
            on_released: RwLock::new(None),
        });
        let attachment = Attachment::new(device, DeviceKind::Keyboard, blocker.clone());
        Self {
            blocker,
            simulator,
            attachment,
        }
    }

    /// Starts swallowing `key`. Installs the keyboard hook if needed.
    pub fn prevent(&self, key: Key) -> Result<(), InputError> {
        if !self.blocker.lock().insert(key) {
            return Ok(());
        }
        if let Err(e) = self.attachment.device().hook() {
            self.blocker.lock().remove(&key);
            return Err(e);
        }
        log::info!("manipulator: preventing {key:?}");
        Ok(())
    }

    /// Stops swallowing `key`.
    pub fn release(&self, key: Key) {
        // Guard dropped before notifying so the callback may prevent again.
        let removed = self.blocker.lock().remove(&key);
        if removed {
            log::info!("manipulator: released {key:?}");
            self.attachment.release();
            notify(&self.blocker.on_released, key);
        }
    }

    pub fn release_all(&self) {
        let released = std::mem::take(&mut *self.blocker.lock());
        if released.is_empty() {
            return;
        }
        log::info!("manipulator: released {} key(s)", released.len());
        self.attachment.release();
        for key in released {
            notify(&self.blocker.on_released, key);
        }
    }

    pub fn is_prevented(&self, key: Key) -> bool {
        self.blocker.lock().contains(&key)
    }

    pub fn locked_keys(&self) -> Vec<Key> {
        self.blocker.lock().iter().copied().collect()
    }

    /// Called with the key each time a prevented key is pressed.
    pub fn on_prevented(&self, callback: impl Fn(Key) + Send + Sync + 'static) {
        set(&self.blocker.on_prevented, callback);
    }

    /// Called with each key `release` or `release_all` stops swallowing.
    pub fn on_released(&self, callback: impl Fn(Key) + Send + Sync + 'static) {
        set(&self.blocker.on_released, callback);
    }

    /// Whether `key` is physically held down right now. Prevented keys are
    /// still reported: blocking hides them from applications, not from the
    /// keyboard state.
    pub fn is_key_pressed(&self, key: Key) -> Result<bool, InputError> {
        let simulator = self.simulator.as_deref().ok_or_else(|| {
            InputError::Unavailable("no key state backend available".into())
        })?;
        simulator.is_key_pressed(key)
    }

    /// Synthesizes a press and release of `key`.
    pub fn press(&self, key: Key) -> Result<(), InputError> {
        self.simulator(key)?.press(key)
    }

    /// Holds every key in `keys` down together, then releases them.
    pub fn press_combination(&self, keys: &[Key]) -> Result<(), InputError> {
        let Some(&first) = keys.first() else {
            return Ok(());
        };
        let mut distinct = Vec::with_capacity(keys.len());
        for &key in keys {
            if !distinct.contains(&key) {
                distinct.push(key);
            }
        }
        self.simulator(first)?.press_combination(&distinct)
    }

    /// Tears the manipulator down now, releasing every prevented key.
    pub fn dispose(self) {}

    fn simulator(&self, key: Key) -> Result<&dyn KeySimulator, InputError> {
        self.simulator.as_deref().ok_or_else(|| InputError::Simulation {
            key,
            reason: "no key injection backend available".into(),
        })
    }
}

impl Default for KeyboardManipulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KeyboardManipulator {
    fn drop(&mut self) {
        self.blocker.lock().clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::KeyEvent;
    use crate::interceptor::Verdict;
    use crate::keyboard::KeyboardListener;
    use crate::platform::ManualSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records presses; fails on a configured key.
    #[derive(Default)]
    struct RecordingSimulator {
        pressed: Arc<Mutex<Vec<Vec<Key>>>>,
        fail_on: Option<Key>,
        held: Vec<Key>,
    }

    impl KeySimulator for RecordingSimulator {
        fn press(&self, key: Key) -> Result<(), InputError> {
            self.press_combination(&[key])
        }

        fn press_combination(&self, keys: &[Key]) -> Result<(), InputError> {
            if let Some(bad) = self.fail_on.filter(|bad| keys.contains(bad)) {
                return Err(InputError::Simulation {
                    key: bad,
                    reason: "rejected".into(),
                });
            }
            self.pressed.lock().unwrap().push(keys.to_vec());
            Ok(())
        }

        fn is_key_pressed(&self, key: Key) -> Result<bool, InputError> {
            Ok(self.held.contains(&key))
        }
    }

    fn setup() -> (ManualSource, Arc<Device>, KeyboardManipulator, Arc<Mutex<Vec<Vec<Key>>>>) {
        let source = ManualSource::keyboard();
        let device = Device::new(Box::new(source.clone()));
        let simulator = RecordingSimulator {
            fail_on: Some(Key::Pause),
            held: vec![Key::Shift],
            ..Default::default()
        };
        let pressed = simulator.pressed.clone();
        let manipulator = KeyboardManipulator::with_device(device.clone(), Some(Box::new(simulator)));
        (source, device, manipulator, pressed)
    }

    #[test]
    fn prevented_key_is_suppressed_others_propagate() {
        let (source, _device, manipulator, _) = setup();
        manipulator.prevent(Key::Meta).unwrap();
        assert!(source.is_hooked());

        assert_eq!(source.emit(KeyEvent::down(Key::Meta)), Some(Verdict::Suppress));
        assert_eq!(source.emit(KeyEvent::up(Key::Meta)), Some(Verdict::Suppress));
        assert_eq!(source.emit(KeyEvent::down(Key::A)), Some(Verdict::Propagate));
    }

    #[test]
    fn listeners_still_see_prevented_keys() {
        let (source, device, manipulator, _) = setup();
        let listener = KeyboardListener::with_device(device);
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        listener
            .subscribe(
                Key::F1,
                move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .unwrap();
        manipulator.prevent(Key::F1).unwrap();

        assert_eq!(source.emit(KeyEvent::down(Key::F1)), Some(Verdict::Suppress));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_prevented_fires_on_key_down() {
        let (source, _device, manipulator, _) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        manipulator.on_prevented(move |key| sink.lock().unwrap().push(key));
        manipulator.prevent(Key::Escape).unwrap();

        source.emit(KeyEvent::down(Key::Escape));
        source.emit(KeyEvent::up(Key::Escape));
        assert_eq!(*seen.lock().unwrap(), vec![Key::Escape]);
    }

    #[test]
    fn releasing_last_key_releases_hook() {
        let (source, _device, manipulator, _) = setup();
        manipulator.prevent(Key::A).unwrap();
        manipulator.prevent(Key::B).unwrap();
        assert_eq!(manipulator.locked_keys(), vec![Key::A, Key::B]);

        manipulator.release(Key::A);
        assert!(source.is_hooked());
        assert!(!manipulator.is_prevented(Key::A));
        manipulator.release_all();
        assert!(!source.is_hooked());
        assert!(manipulator.locked_keys().is_empty());
    }

    #[test]
    fn dispose_releases_hook() {
        let (source, device, manipulator, _) = setup();
        manipulator.prevent(Key::Tab).unwrap();
        manipulator.dispose();
        assert!(!source.is_hooked());
        assert_eq!(device.interceptor_count(), 0);
    }

    #[test]
    fn press_goes_through_simulator() {
        let (_source, _device, manipulator, pressed) = setup();
        manipulator.press(Key::A).unwrap();
        manipulator
            .press_combination(&[Key::Ctrl, Key::Ctrl, Key::C])
            .unwrap();
        manipulator.press_combination(&[]).unwrap();
        assert_eq!(
            *pressed.lock().unwrap(),
            vec![vec![Key::A], vec![Key::Ctrl, Key::C]]
        );
    }

    #[test]
    fn simulation_failure_is_surfaced() {
        let (_source, _device, manipulator, _) = setup();
        let err = manipulator.press(Key::Pause).unwrap_err();
        assert!(matches!(err, InputError::Simulation { key: Key::Pause, .. }));
    }

    #[test]
    fn on_released_reports_each_released_key() {
        let (_source, _device, manipulator, _) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        manipulator.on_released(move |key| sink.lock().unwrap().push(key));
        manipulator.prevent(Key::A).unwrap();
        manipulator.prevent(Key::B).unwrap();
        manipulator.prevent(Key::C).unwrap();

        manipulator.release(Key::B);
        manipulator.release(Key::Z);
        manipulator.release_all();
        assert_eq!(*seen.lock().unwrap(), vec![Key::B, Key::A, Key::C]);
    }

    #[test]
    fn released_callback_may_prevent_again() {
        let (source, device, _, _) = setup();
        let manipulator = Arc::new(KeyboardManipulator::with_device(device, None));
        let again = Arc::downgrade(&manipulator);
        manipulator.on_released(move |key| {
            if let Some(manipulator) = again.upgrade() {
                manipulator.prevent(key).unwrap();
            }
        });
        manipulator.prevent(Key::Tab).unwrap();
        manipulator.release(Key::Tab);

        assert!(manipulator.is_prevented(Key::Tab));
        assert!(source.is_hooked());
    }

    #[test]
    fn key_state_comes_from_simulator() {
        let (_source, _device, manipulator, _) = setup();
        assert!(manipulator.is_key_pressed(Key::Shift).unwrap());
        assert!(!manipulator.is_key_pressed(Key::A).unwrap());
    }

    #[test]
    fn key_state_without_backend_is_unavailable() {
        let device = Device::new(Box::new(ManualSource::keyboard()));
        let manipulator = KeyboardManipulator::with_device(device, None);
        assert!(matches!(
            manipulator.is_key_pressed(Key::A),
            Err(InputError::Unavailable(_))
        ));
    }
}
