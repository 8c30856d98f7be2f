use std::{
    sync::{LazyLock, Mutex},
    thread::JoinHandle,
};

use anyhow::anyhow;
use tracing::error;
use windows::Win32::{
    Foundation::{E_ACCESSDENIED, LPARAM, LRESULT, WPARAM},
    System::Threading::GetCurrentThreadId,
    UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
        TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL,
        WM_KEYDOWN, WM_QUIT, WM_SYSKEYDOWN,
    },
};

use super::{KeyDownCallback, KeyEventSource, KeySourceError};

/// A low-level hook procedure carries no user context pointer, so the registered callback is
/// handed over through process-global state. Only one tap is active at a time.
static ACTIVE_CALLBACK: LazyLock<Mutex<Option<KeyDownCallback>>> =
    LazyLock::new(|| Mutex::new(None));

/// Key events synthesized by other software carry this flag. They are not user keypresses.
const LLKHF_INJECTED: u32 = 0x10;

unsafe extern "system" fn low_level_keyboard_proc(
    code: i32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if code >= 0 {
        let kbd = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let message = wparam.0 as u32;
        let injected = (kbd.flags.0 & LLKHF_INJECTED) != 0;

        if !injected && (message == WM_KEYDOWN || message == WM_SYSKEYDOWN) {
            if let Some(callback) = ACTIVE_CALLBACK.lock().unwrap().as_ref() {
                callback();
            }
        }
    }

    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

/// Taps the keyboard through a WH_KEYBOARD_LL hook. The hook only receives events while the
/// installing thread pumps messages, so installation and the message loop share a dedicated
/// thread.
pub struct WindowsKeyTap {
    worker: Option<TapWorker>,
}

struct TapWorker {
    thread_id: u32,
    handle: JoinHandle<()>,
}

impl WindowsKeyTap {
    pub fn new() -> Self {
        Self { worker: None }
    }
}

impl Default for WindowsKeyTap {
    fn default() -> Self {
        Self::new()
    }
}

fn run_message_loop(ready: std::sync::mpsc::Sender<Result<u32, windows::core::Error>>) {
    let hook = match unsafe {
        SetWindowsHookExW(WH_KEYBOARD_LL, Some(low_level_keyboard_proc), None, 0)
    } {
        Ok(hook) => {
            let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));
            hook
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut message = MSG::default();
    while unsafe { GetMessageW(&mut message, None, 0, 0) }.as_bool() {
        unsafe {
            let _ = TranslateMessage(&message);
            DispatchMessageW(&message);
        }
    }

    if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
        error!("Failed to remove the keyboard hook {e:?}");
    }
}

impl KeyEventSource for WindowsKeyTap {
    fn start(&mut self, on_key_down: KeyDownCallback) -> Result<(), KeySourceError> {
        if self.worker.is_some() {
            return Err(anyhow!("key tap is already running").into());
        }

        *ACTIVE_CALLBACK.lock().unwrap() = Some(on_key_down);

        let (ready_sender, ready_receiver) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || run_message_loop(ready_sender));

        let thread_id = match ready_receiver.recv() {
            Ok(Ok(thread_id)) => thread_id,
            Ok(Err(e)) => {
                *ACTIVE_CALLBACK.lock().unwrap() = None;
                if e.code() == E_ACCESSDENIED {
                    return Err(KeySourceError::PermissionDenied);
                }
                return Err(anyhow!("failed to install keyboard hook: {e:?}").into());
            }
            Err(_) => {
                *ACTIVE_CALLBACK.lock().unwrap() = None;
                return Err(anyhow!("keyboard hook thread died during installation").into());
            }
        };

        self.worker = Some(TapWorker { thread_id, handle });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        // WM_QUIT ends the message loop and the hook is removed before the thread exits. Joining
        // afterwards is what guarantees no callback runs past this point.
        if let Err(e) = unsafe { PostThreadMessageW(worker.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
        {
            error!("Failed to signal the keyboard hook thread {e:?}");
        }
        if worker.handle.join().is_err() {
            error!("Keyboard hook thread terminated abnormally");
        }

        *ACTIVE_CALLBACK.lock().unwrap() = None;
    }
}
