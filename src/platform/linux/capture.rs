//! Keyboard and mouse capture via the Linux evdev interface (/dev/input/event*).
//!
//! `EvdevSource::hook()` enumerates the matching devices under /dev/input/,
//! builds a single-threaded tokio runtime and opens an event stream per
//! device, all on the calling thread so every failure surfaces from `hook()`.
//! A background thread then drives the runtime, reading every device
//! concurrently via `futures::stream::SelectAll`.
//!
//! evdev observes events without grabbing the device, so a `Suppress`
//! verdict cannot be honored; it is logged and the event still reaches the
//! desktop. Pointer positions are not available, only relative motion.
//!
//! Required permissions: the process user must be a member of the `input` group.
//!   sudo usermod -aG input $USER   (then log out and back in)

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use evdev::{Device as EvdevDevice, EventStream, InputEventKind, Key as EvdevKey, RelativeAxisType};
use futures::stream::SelectAll;
use futures::StreamExt;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;

use super::keycodes::evdev_to_key;
use crate::error::InputError;
use crate::event::{DeviceKind, KeyEvent, KeyState, MouseEvent, MouseInput, RawEvent};
use crate::interceptor::Verdict;
use crate::platform::{EventSink, RawInputSource, RetiredThread};

/// Windows reports one wheel notch as 120; evdev as 1.
const WHEEL_DELTA: i32 = 120;

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

/// evdev-backed source for every keyboard or every mouse on the system.
pub struct EvdevSource {
    kind: DeviceKind,
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl EvdevSource {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            stop_tx: None,
            thread: None,
        }
    }
}

impl RawInputSource for EvdevSource {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn hook(&mut self, sink: EventSink) -> Result<(), InputError> {
        if self.stop_tx.is_some() {
            return Ok(());
        }

        let kind = self.kind;
        let devices = find_devices(kind)?;
        log::info!("capture: found {} {kind} device(s)", devices.len());
        for dev in &devices {
            log::debug!("capture: monitoring {:?}", dev.name().unwrap_or("unnamed"));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InputError::hook_install(kind, format!("cannot build tokio runtime: {e}")))?;
        let streams = open_streams(&runtime, devices)
            .map_err(|e| InputError::hook_install(kind, format!("cannot read {kind} device: {e}")))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let thread = thread::Builder::new()
            .name(format!("hookhub-{kind}"))
            .spawn(move || runtime.block_on(capture_loop(kind, streams, sink, stop_rx)))
            .map_err(|e| InputError::hook_install(kind, e.to_string()))?;

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);
        Ok(())
    }

    fn unhook(&mut self) -> Result<RetiredThread, InputError> {
        let Some(tx) = self.stop_tx.take() else {
            return Ok(RetiredThread::none());
        };
        // The reader stops as soon as the event in flight has been handled.
        let _ = tx.send(());
        log::info!("capture: {} reader stopping", self.kind);
        Ok(self.thread.take().map(RetiredThread::new).unwrap_or_default())
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        if let Ok(thread) = self.unhook() {
            thread.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Device enumeration
// ---------------------------------------------------------------------------

/// Every device of `kind` in /dev/input/ this process can open.
///
/// Keyboards are devices reporting `KEY_A`; mice are devices reporting
/// `BTN_LEFT`.
pub(super) fn enumerate(kind: DeviceKind) -> Vec<EvdevDevice> {
    let marker = match kind {
        DeviceKind::Keyboard => EvdevKey::KEY_A,
        DeviceKind::Mouse => EvdevKey::BTN_LEFT,
    };
    evdev::enumerate()
        .map(|(_, dev)| dev)
        .filter(|dev| dev.supported_keys().is_some_and(|keys| keys.contains(marker)))
        .collect()
}

/// Like `enumerate`, but finding nothing is a hook failure.
fn find_devices(kind: DeviceKind) -> Result<Vec<EvdevDevice>, InputError> {
    let devices = enumerate(kind);
    if devices.is_empty() {
        Err(no_devices(kind))
    } else {
        Ok(devices)
    }
}

/// Most commonly the process user is not in the `input` group.
fn no_devices(kind: DeviceKind) -> InputError {
    InputError::hook_install(
        kind,
        format!(
            "no {kind} devices found in /dev/input/. \
             Ensure this user is in the 'input' group: \
             sudo usermod -aG input $USER (then log out and back in)."
        ),
    )
}

/// Registers every device with `runtime`'s reactor.
fn open_streams(
    runtime: &Runtime,
    devices: Vec<EvdevDevice>,
) -> io::Result<SelectAll<EventStream>> {
    let _context = runtime.enter();
    let mut streams = SelectAll::new();
    for device in devices {
        streams.push(device.into_event_stream()?);
    }
    Ok(streams)
}

// ---------------------------------------------------------------------------
// Async event loop
// ---------------------------------------------------------------------------

async fn capture_loop(
    kind: DeviceKind,
    mut streams: SelectAll<EventStream>,
    sink: EventSink,
    stop_rx: oneshot::Receiver<()>,
) {
    log::info!("capture: evdev {kind} capture active");

    let mut translator = Translator::default();
    tokio::select! {
        _ = stop_rx => {
            log::debug!("capture: {kind} stop signal received");
        }
        _ = async {
            while let Some(Ok(event)) = streams.next().await {
                if let Some(raw) = translator.translate(kind, event) {
                    if sink(&raw) == Verdict::Suppress {
                        log::debug!("capture: cannot suppress {raw:?} without grabbing the device");
                    }
                }
            }
            log::info!("capture: all {kind} streams ended");
        } => {}
    }
}

// ---------------------------------------------------------------------------
// Event translation
// ---------------------------------------------------------------------------

/// Turns evdev events into `RawEvent`s. Relative motion on both axes within
/// one `SYN_REPORT` frame becomes a single `Move`.
#[derive(Default)]
struct Translator {
    moved: bool,
}

impl Translator {
    fn translate(&mut self, kind: DeviceKind, event: evdev::InputEvent) -> Option<RawEvent> {
        match (kind, event.kind()) {
            (DeviceKind::Keyboard, InputEventKind::Key(key)) => {
                // Auto-repeat (value 2) is dropped; listeners see one down per press.
                let state = match event.value() {
                    1 => KeyState::Down,
                    0 => KeyState::Up,
                    _ => return None,
                };
                match evdev_to_key(key.code()) {
                    Some(key) => Some(KeyEvent::at(key, state, Instant::now()).into()),
                    None => {
                        log::trace!("capture: unknown evdev keycode {}", key.code());
                        None
                    }
                }
            }
            (DeviceKind::Mouse, InputEventKind::Key(button)) => {
                let pressed = event.value() != 0;
                let event = match button {
                    EvdevKey::BTN_LEFT if pressed => MouseEvent::LeftButtonDown,
                    EvdevKey::BTN_LEFT => MouseEvent::LeftButtonUp,
                    EvdevKey::BTN_RIGHT if pressed => MouseEvent::RightButtonDown,
                    EvdevKey::BTN_RIGHT => MouseEvent::RightButtonUp,
                    EvdevKey::BTN_MIDDLE if pressed => MouseEvent::MiddleButtonDown,
                    EvdevKey::BTN_MIDDLE => MouseEvent::MiddleButtonUp,
                    _ => return None,
                };
                Some(MouseInput::new(event).into())
            }
            (DeviceKind::Mouse, InputEventKind::RelAxis(axis)) => match axis {
                RelativeAxisType::REL_X | RelativeAxisType::REL_Y => {
                    self.moved = true;
                    None
                }
                RelativeAxisType::REL_WHEEL => {
                    let mut input = MouseInput::new(MouseEvent::Scroll);
                    input.delta = event.value() * WHEEL_DELTA;
                    Some(input.into())
                }
                _ => None,
            },
            (DeviceKind::Mouse, InputEventKind::Synchronization(_)) if self.moved => {
                self.moved = false;
                Some(MouseInput::new(MouseEvent::Move).into())
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Key;
    use evdev::{EventType, InputEvent};

    fn key(code: EvdevKey, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, code.code(), value)
    }

    fn rel(axis: RelativeAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::RELATIVE, axis.0, value)
    }

    fn syn() -> InputEvent {
        InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)
    }

    #[test]
    fn new_produces_idle_state() {
        let source = EvdevSource::new(DeviceKind::Keyboard);
        assert!(source.stop_tx.is_none());
        assert!(source.thread.is_none());
    }

    #[test]
    fn unhook_on_unhooked_source_is_noop() {
        let mut source = EvdevSource::new(DeviceKind::Mouse);
        source.unhook().unwrap().join();
    }

    #[test]
    fn missing_devices_fail_the_install_with_a_hint() {
        let err = no_devices(DeviceKind::Mouse);
        let InputError::HookInstall { device, reason } = &err else {
            panic!("expected a hook install error, got {err:?}");
        };
        assert_eq!(*device, DeviceKind::Mouse);
        assert!(reason.contains("'input' group"), "{reason}");
    }

    #[test]
    fn position_is_unavailable() {
        let source = EvdevSource::new(DeviceKind::Mouse);
        assert!(matches!((source.pointer())(), Err(InputError::Unavailable(_))));
    }

    #[test]
    fn key_transitions_translate_and_repeat_is_dropped() {
        let mut t = Translator::default();
        let Some(RawEvent::Key(down)) = t.translate(DeviceKind::Keyboard, key(EvdevKey::KEY_A, 1))
        else {
            panic!("expected a key event");
        };
        assert_eq!((down.key, down.state), (Key::A, KeyState::Down));
        assert!(t.translate(DeviceKind::Keyboard, key(EvdevKey::KEY_A, 2)).is_none());
        let Some(RawEvent::Key(up)) = t.translate(DeviceKind::Keyboard, key(EvdevKey::KEY_A, 0))
        else {
            panic!("expected a key event");
        };
        assert_eq!(up.state, KeyState::Up);
    }

    #[test]
    fn motion_frame_yields_one_move() {
        let mut t = Translator::default();
        assert!(t.translate(DeviceKind::Mouse, rel(RelativeAxisType::REL_X, 3)).is_none());
        assert!(t.translate(DeviceKind::Mouse, rel(RelativeAxisType::REL_Y, -1)).is_none());
        let Some(RawEvent::Mouse(input)) = t.translate(DeviceKind::Mouse, syn()) else {
            panic!("expected a move");
        };
        assert_eq!(input.event, MouseEvent::Move);
        assert_eq!(input.position, None);
        assert!(t.translate(DeviceKind::Mouse, syn()).is_none());
    }

    #[test]
    fn wheel_and_buttons_translate() {
        let mut t = Translator::default();
        let Some(RawEvent::Mouse(scroll)) =
            t.translate(DeviceKind::Mouse, rel(RelativeAxisType::REL_WHEEL, -1))
        else {
            panic!("expected a scroll");
        };
        assert_eq!((scroll.event, scroll.delta), (MouseEvent::Scroll, -WHEEL_DELTA));

        let Some(RawEvent::Mouse(click)) =
            t.translate(DeviceKind::Mouse, key(EvdevKey::BTN_MIDDLE, 1))
        else {
            panic!("expected a button");
        };
        assert_eq!(click.event, MouseEvent::MiddleButtonDown);
        assert!(t.translate(DeviceKind::Mouse, key(EvdevKey::BTN_SIDE, 1)).is_none());
    }

    #[test]
    fn keyboard_source_ignores_pointer_events() {
        let mut t = Translator::default();
        assert!(t.translate(DeviceKind::Keyboard, rel(RelativeAxisType::REL_X, 1)).is_none());
        assert!(t.translate(DeviceKind::Keyboard, syn()).is_none());
    }
}
