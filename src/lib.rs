//! hookhub -- shared low-level keyboard and mouse hooks.
//!
//! Any number of listeners register callbacks for keys, key combinations, key
//! sequences and mouse events while the process holds at most one OS hook per
//! device. The hook is installed by the first subscription and removed as soon
//! as no listener on that device has anything left to listen for.
//!
//! ```no_run
//! use hookhub::{Key, KeyboardListener, SequenceListener};
//!
//! let keys = KeyboardListener::new();
//! keys.subscribe(Key::F5, |key| println!("{key:?} pressed"), None)?;
//!
//! let sequences = SequenceListener::new();
//! sequences.subscribe_once([Key::W, Key::A, Key::S, Key::D], || println!("wasd"))?;
//! # Ok::<(), hookhub::InputError>(())
//! ```
//!
//! Callbacks run synchronously on the backend's hook thread. A slow callback
//! stalls input delivery for the whole desktop; hand long work off.

pub mod bindings;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod interceptor;
pub mod keyboard;
mod listener;
pub mod manipulator;
pub mod mouse;
pub mod platform;
pub mod sequence;
pub mod subscription;

pub use bindings::Bindings;
pub use config::{Config, ConfigError};
pub use device::{Device, InterceptorId, Registry};
pub use error::InputError;
pub use event::{Coordinates, DeviceKind, Key, KeyEvent, KeyState, MouseEvent, MouseInput, RawEvent};
pub use interceptor::{Interceptor, InterceptorKind, InterceptorResponse, Pipeline, Verdict};
pub use keyboard::{KeySubscription, KeyTrigger, KeyboardListener};
pub use manipulator::KeyboardManipulator;
pub use mouse::{MouseListener, MouseSubscription};
pub use platform::{KeySimulator, ManualSource, PointerReader, RawInputSource, RetiredThread};
pub use sequence::{SequenceListener, SequenceSubscription, MAX_SEQUENCE_LENGTH, MIN_SEQUENCE_LENGTH};
pub use subscription::{Subscription, SubscriptionId};
