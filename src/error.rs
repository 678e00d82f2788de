//! Library error type.

use thiserror::Error;

use crate::event::{DeviceKind, Key};
use crate::sequence::{MAX_SEQUENCE_LENGTH, MIN_SEQUENCE_LENGTH};

/// Errors surfaced synchronously by listeners, devices and backends.
///
/// Unsubscribing something that does not exist is not an error.
#[derive(Debug, Error)]
pub enum InputError {
    /// A key sequence was registered outside the accepted length range.
    #[error(
        "a key sequence must have between {} and {} keys, got {len}",
        MIN_SEQUENCE_LENGTH,
        MAX_SEQUENCE_LENGTH
    )]
    SequenceLength { len: usize },

    /// A key combination was registered without any keys.
    #[error("a key combination needs at least one key")]
    EmptyCombination,

    /// The OS refused to install the low-level hook.
    #[error("failed to install {device} hook: {reason}")]
    HookInstall { device: DeviceKind, reason: String },

    /// A synthesized key press was rejected by the OS.
    #[error("failed to simulate {key:?}: {reason}")]
    Simulation { key: Key, reason: String },

    /// The backend cannot run in this session (no uinput access, no readable keyboard).
    #[error("input backend unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl InputError {
    pub(crate) fn hook_install(device: DeviceKind, reason: impl Into<String>) -> Self {
        InputError::HookInstall {
            device,
            reason: reason.into(),
        }
    }
}
