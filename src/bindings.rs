//! Turns a `Config` into live listeners.

use std::sync::Arc;

use crate::config::Config;
use crate::device::Registry;
use crate::error::InputError;
use crate::event::Key;
use crate::keyboard::{KeyTrigger, KeyboardListener};
use crate::manipulator::KeyboardManipulator;
use crate::mouse::MouseListener;
use crate::sequence::SequenceListener;

/// Listeners created from a config. Dropping it unregisters everything.
pub struct Bindings {
    pub keys: KeyboardListener,
    pub sequences: SequenceListener,
    pub mouse: MouseListener,
    pub blocker: KeyboardManipulator,
}

impl Bindings {
    /// Registers every binding in `config` on `registry`'s devices.
    ///
    /// Stops at the first error; whatever was registered before it is torn
    /// down again when the partial `Bindings` is dropped.
    pub fn install(config: &Config, registry: &Registry) -> Result<Self, InputError> {
        let bindings = Bindings {
            keys: KeyboardListener::with_device(registry.keyboard().clone()),
            sequences: SequenceListener::with_device(registry.keyboard().clone()),
            mouse: MouseListener::with_device(registry.mouse().clone()),
            blocker: KeyboardManipulator::with_device(registry.keyboard().clone(), None),
        };

        for &key in &config.prevent {
            bindings.blocker.prevent(key)?;
        }

        for binding in &config.keys {
            let trigger = KeyTrigger::combination(binding.keys.iter().copied());
            let message: Arc<str> = binding
                .message
                .clone()
                .unwrap_or_else(|| format!("{:?}", binding.keys))
                .into();
            let callback = move |key: Key| log::info!("binding: {message} ({key:?})");
            if binding.once {
                bindings.keys.subscribe_once(trigger, callback)?;
            } else {
                bindings.keys.subscribe(trigger, callback, binding.interval())?;
            }
        }

        for binding in &config.sequences {
            let message: Arc<str> = binding
                .message
                .clone()
                .unwrap_or_else(|| format!("sequence {:?}", binding.keys))
                .into();
            let callback = move || log::info!("binding: {message}");
            let keys = binding.keys.iter().copied();
            if binding.once {
                bindings.sequences.subscribe_once(keys, callback)?;
            } else {
                bindings.sequences.subscribe(keys, callback, None)?;
            }
        }

        for binding in &config.mouse {
            let message: Arc<str> = binding
                .message
                .clone()
                .unwrap_or_else(|| format!("{:?}", binding.event))
                .into();
            let callback = move || log::info!("binding: {message}");
            if binding.once {
                bindings.mouse.subscribe_once(binding.event, callback)?;
            } else {
                bindings
                    .mouse
                    .subscribe(binding.event, callback, binding.interval())?;
            }
        }

        log::info!(
            "bindings: {} key, {} sequence, {} mouse, {} prevented",
            config.keys.len(),
            config.sequences.len(),
            config.mouse.len(),
            config.prevent.len()
        );
        Ok(bindings)
    }

    /// True while any binding still holds a hook.
    pub fn is_active(&self) -> bool {
        self.keys.is_listening()
            || self.sequences.is_listening()
            || self.mouse.is_listening()
            || !self.blocker.locked_keys().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{KeyEvent, MouseEvent, MouseInput};
    use crate::interceptor::Verdict;
    use crate::platform::ManualSource;

    fn registry() -> (ManualSource, ManualSource, Registry) {
        let keyboard = ManualSource::keyboard();
        let mouse = ManualSource::mouse();
        let registry = Registry::new(Box::new(keyboard.clone()), Box::new(mouse.clone()));
        (keyboard, mouse, registry)
    }

    #[test]
    fn empty_config_hooks_nothing() {
        let (keyboard, mouse, registry) = registry();
        let bindings = Bindings::install(&Config::default(), &registry).unwrap();
        assert!(!bindings.is_active());
        assert!(!keyboard.is_hooked());
        assert!(!mouse.is_hooked());
    }

    #[test]
    fn config_bindings_share_one_hook_per_device() {
        let (keyboard, mouse, registry) = registry();
        let config = Config::parse(
            r#"
            prevent = ["CapsLock"]

            [[keys]]
            keys = ["Ctrl", "T"]

            [[sequences]]
            keys = ["G", "G"]
            once = true

            [[mouse]]
            event = "Scroll"
            once = true
            "#,
        )
        .unwrap();

        let bindings = Bindings::install(&config, &registry).unwrap();
        assert_eq!(keyboard.hook_calls(), 1);
        assert_eq!(mouse.hook_calls(), 1);

        assert_eq!(keyboard.emit(KeyEvent::down(Key::CapsLock)), Some(Verdict::Suppress));
        keyboard.emit(KeyEvent::down(Key::G));
        keyboard.emit(KeyEvent::down(Key::G));
        assert!(!bindings.sequences.is_listening());

        mouse.emit(MouseInput::new(MouseEvent::Scroll));
        assert!(!mouse.is_hooked());

        drop(bindings);
        assert!(!keyboard.is_hooked());
    }

    #[test]
    fn hook_failure_tears_down_partial_install() {
        let (keyboard, _mouse, registry) = registry();
        let config = Config::parse("[[keys]]\nkeys = [\"A\"]\n").unwrap();
        keyboard.fail_next_hook();
        assert!(Bindings::install(&config, &registry).is_err());
        assert!(!keyboard.is_hooked());
        assert_eq!(registry.keyboard().interceptor_count(), 0);
    }
}
