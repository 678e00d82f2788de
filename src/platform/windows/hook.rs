//! Low-level keyboard and mouse hooks (`WH_KEYBOARD_LL` / `WH_MOUSE_LL`).
//!
//! `hook()` spawns a background thread that installs the hook and runs a
//! `GetMessageW` loop; low-level hooks only deliver while their installing
//! thread pumps messages. `unhook()` removes the hook, posts `WM_QUIT` and
//! hands the thread back; the `Device` joins it once it holds no lock.
//!
//! Hook procs receive no user pointer, so the event sink lives in a
//! process-global slot per device kind. The `Registry` guarantees a single
//! `LowLevelHook` per kind.
//!
//! No special permissions are required on Windows for low-level hooks.

use std::ptr;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use windows_sys::Win32::Foundation::{LPARAM, LRESULT, POINT, WPARAM};
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetCursorPos, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, LLKHF_EXTENDED, LLKHF_INJECTED,
    MSG, MSLLHOOKSTRUCT, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN,
    WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_QUIT,
    WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::keycodes::vk_to_key;
use crate::error::InputError;
use crate::event::{Coordinates, DeviceKind, KeyEvent, KeyState, MouseEvent, MouseInput, RawEvent};
use crate::interceptor::Verdict;
use crate::platform::{EventSink, PointerReader, RawInputSource, RetiredThread};

// ---------------------------------------------------------------------------
// Process-global sink storage
// ---------------------------------------------------------------------------

static KEYBOARD_SINK: Mutex<Option<EventSink>> = Mutex::new(None);
static MOUSE_SINK: Mutex<Option<EventSink>> = Mutex::new(None);

fn sink_slot(kind: DeviceKind) -> &'static Mutex<Option<EventSink>> {
    match kind {
        DeviceKind::Keyboard => &KEYBOARD_SINK,
        DeviceKind::Mouse => &MOUSE_SINK,
    }
}

fn set_sink(kind: DeviceKind, sink: Option<EventSink>) {
    *sink_slot(kind).lock().unwrap_or_else(PoisonError::into_inner) = sink;
}

/// Forwards `event` to the sink for its device. The sink is cloned out so a
/// callback that unhooks from inside the proc does not deadlock on the slot.
fn dispatch(event: RawEvent) -> Verdict {
    let sink = sink_slot(event.device())
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    match sink {
        Some(sink) => sink(&event),
        None => Verdict::Propagate,
    }
}

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

/// One low-level hook for one device kind.
pub struct LowLevelHook {
    kind: DeviceKind,
    /// Handle returned by `SetWindowsHookExW`. Stored as isize for Send.
    hook: Option<isize>,
    /// Message-loop thread id, target of `PostThreadMessageW`.
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl LowLevelHook {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            hook: None,
            thread_id: 0,
            thread: None,
        }
    }
}

impl RawInputSource for LowLevelHook {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn hook(&mut self, sink: EventSink) -> Result<(), InputError> {
        if self.hook.is_some() {
            return Ok(());
        }
        set_sink(self.kind, Some(sink));

        let kind = self.kind;
        let (info_tx, info_rx) = mpsc::channel::<Result<(isize, u32), InputError>>();

        let thread = thread::Builder::new()
            .name(format!("hookhub-{kind}"))
            .spawn(move || {
                let hook = unsafe {
                    match kind {
                        DeviceKind::Keyboard => SetWindowsHookExW(
                            WH_KEYBOARD_LL,
                            Some(keyboard_proc),
                            ptr::null_mut(),
                            0,
                        ),
                        DeviceKind::Mouse => {
                            SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), ptr::null_mut(), 0)
                        }
                    }
                };
                if hook.is_null() {
                    let reason = std::io::Error::last_os_error().to_string();
                    let _ = info_tx.send(Err(InputError::hook_install(kind, reason)));
                    return;
                }

                let thread_id = unsafe { GetCurrentThreadId() };
                let _ = info_tx.send(Ok((hook as isize, thread_id)));
                log::info!("hook: {kind} low-level hook active");

                // Returns 0 on WM_QUIT, -1 on error; both exit the loop.
                unsafe {
                    let mut msg: MSG = std::mem::zeroed();
                    while GetMessageW(&mut msg, ptr::null_mut(), 0, 0) > 0 {}
                }
                log::debug!("hook: {kind} message loop exited");
            })
            .map_err(|e| InputError::hook_install(kind, e.to_string()));
        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                set_sink(kind, None);
                return Err(e);
            }
        };

        match info_rx.recv() {
            Ok(Ok((hook, thread_id))) => {
                self.hook = Some(hook);
                self.thread_id = thread_id;
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                set_sink(kind, None);
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                set_sink(kind, None);
                Err(InputError::hook_install(
                    kind,
                    "hook thread exited before reporting status",
                ))
            }
        }
    }

    fn unhook(&mut self) -> Result<RetiredThread, InputError> {
        // Unhook first so no further procs fire once this returns.
        let Some(hook) = self.hook.take() else {
            return Ok(RetiredThread::none());
        };
        unsafe { UnhookWindowsHookEx(hook as HHOOK) };
        set_sink(self.kind, None);

        // The loop exits once the proc currently running (if any) returns.
        if self.thread_id != 0 {
            unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0) };
            self.thread_id = 0;
        }
        log::info!("hook: {} low-level hook removed", self.kind);
        Ok(self.thread.take().map(RetiredThread::new).unwrap_or_default())
    }

    fn pointer(&self) -> PointerReader {
        match self.kind {
            DeviceKind::Mouse => Arc::new(cursor_position),
            DeviceKind::Keyboard => Arc::new(|| {
                Err(InputError::Unavailable(
                    "keyboard hook does not track a pointer position".into(),
                ))
            }),
        }
    }
}

fn cursor_position() -> Result<Coordinates, InputError> {
    let mut point = POINT { x: 0, y: 0 };
    if unsafe { GetCursorPos(&mut point) } == 0 {
        return Err(InputError::Unavailable(format!(
            "GetCursorPos failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(Coordinates::new(point.x, point.y))
}

impl Drop for LowLevelHook {
    fn drop(&mut self) {
        if let Ok(thread) = self.unhook() {
            thread.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Hook procedures
// ---------------------------------------------------------------------------

fn finish(verdict: Verdict, n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    match verdict {
        Verdict::Suppress => 1,
        Verdict::Propagate => unsafe { CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param) },
    }
}

/// Keyboard proc, called on the hook thread. Unknown VK codes pass through.
unsafe extern "system" fn keyboard_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param);
    }

    let kb = &*(l_param as *const KBDLLHOOKSTRUCT);

    let state = match w_param as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => KeyState::Down,
        WM_KEYUP | WM_SYSKEYUP => KeyState::Up,
        _ => return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param),
    };

    let Some(key) = vk_to_key(kb.vkCode as u16, kb.flags & LLKHF_EXTENDED != 0) else {
        log::trace!("hook: unknown VK code {:#04x}", kb.vkCode);
        return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param);
    };

    let event = KeyEvent {
        key,
        state,
        injected: kb.flags & LLKHF_INJECTED != 0,
        timestamp: Instant::now(),
    };
    finish(dispatch(event.into()), n_code, w_param, l_param)
}

/// Mouse proc, called on the hook thread. X buttons and horizontal wheel
/// pass through untouched.
unsafe extern "system" fn mouse_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param);
    }

    let ms = &*(l_param as *const MSLLHOOKSTRUCT);

    let event = match w_param as u32 {
        WM_MOUSEMOVE => MouseEvent::Move,
        WM_LBUTTONDOWN => MouseEvent::LeftButtonDown,
        WM_LBUTTONUP => MouseEvent::LeftButtonUp,
        WM_RBUTTONDOWN => MouseEvent::RightButtonDown,
        WM_RBUTTONUP => MouseEvent::RightButtonUp,
        WM_MBUTTONDOWN => MouseEvent::MiddleButtonDown,
        WM_MBUTTONUP => MouseEvent::MiddleButtonUp,
        WM_MOUSEWHEEL => MouseEvent::Scroll,
        _ => return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param),
    };

    // Wheel delta is the signed high word of mouseData.
    let delta = if event == MouseEvent::Scroll {
        i32::from((ms.mouseData >> 16) as u16 as i16)
    } else {
        0
    };

    let input = MouseInput {
        event,
        position: Some(Coordinates::new(ms.pt.x, ms.pt.y)),
        delta,
        timestamp: Instant::now(),
    };
    finish(dispatch(input.into()), n_code, w_param, l_param)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_produces_idle_state() {
        let hook = LowLevelHook::new(DeviceKind::Mouse);
        assert_eq!(hook.kind(), DeviceKind::Mouse);
        assert!(hook.hook.is_none());
        assert_eq!(hook.thread_id, 0);
        assert!(hook.thread.is_none());
    }

    #[test]
    fn unhook_on_unhooked_source_is_noop() {
        let mut hook = LowLevelHook::new(DeviceKind::Keyboard);
        hook.unhook().unwrap().join();
    }

    #[test]
    fn keyboard_hook_has_no_position() {
        let hook = LowLevelHook::new(DeviceKind::Keyboard);
        assert!(matches!((hook.pointer())(), Err(InputError::Unavailable(_))));
    }

    #[test]
    fn dispatch_without_sink_propagates() {
        set_sink(DeviceKind::Keyboard, None);
        let event = KeyEvent::down(crate::event::Key::A);
        assert_eq!(dispatch(event.into()), Verdict::Propagate);
    }
}
