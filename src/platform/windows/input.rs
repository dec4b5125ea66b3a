//! Global hotkeys and the wheel hook.
//!
//! Both need a thread with a message loop: `RegisterHotKey` without a window
//! posts `WM_HOTKEY` to the registering thread, and a low-level mouse hook
//! is called on the thread that installed it.  [`InputThread`] owns that
//! thread and turns what arrives there into [`InputEvent`]s.
//!
//! Registration has to happen on the input thread too, so
//! [`HotkeyRegistrar`] calls are shipped over as requests and answered
//! synchronously.

use crate::command::InputEvent;
use crate::shortcut::{Key, Modifiers, Shortcut};
use crate::traits::HotkeyRegistrar;
use crate::wheel::{WheelDirection, WheelEvent};
use log::{debug, trace, warn};
use std::cell::{Cell, RefCell};
use std::io;
use std::ptr::null_mut;
use std::sync::mpsc;
use std::thread;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, GetSystemMetrics, PeekMessageW,
    PostThreadMessageW, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, MSG,
    MSLLHOOKSTRUCT, PM_NOREMOVE, SM_CYSCREEN, WH_MOUSE_LL, WM_APP, WM_HOTKEY, WM_MOUSEWHEEL,
    WM_QUIT,
};

/// Posted to the input thread when a request is waiting.
const WM_INPUT_REQUEST: u32 = WM_APP + 1;

enum Request {
    Register(Shortcut, mpsc::SyncSender<bool>),
    UnregisterAll(mpsc::SyncSender<()>),
}

/// Shortcut carried by a `WM_HOTKEY` message: modifiers in the low word of
/// `lparam`, virtual-key code in the high word.
fn decode_hotkey(lparam: isize) -> Shortcut {
    let modifiers = Modifiers::from_bits_truncate((lparam & 0xFFFF) as u32);
    let key = ((lparam >> 16) & 0xFFFF) as u16;
    Shortcut::new(modifiers - Modifiers::NOREPEAT, Key(key))
}

/// Signed wheel delta from the high word of `MSLLHOOKSTRUCT::mouseData`.
fn wheel_delta(mouse_data: u32) -> i16 {
    (mouse_data >> 16) as u16 as i16
}

thread_local! {
    static EVENTS: RefCell<Option<mpsc::Sender<InputEvent>>> = const { RefCell::new(None) };
    static HOOK: Cell<HHOOK> = const { Cell::new(HHOOK(null_mut())) };
}

fn emit(event: InputEvent) {
    EVENTS.with(|events| {
        if let Some(tx) = events.borrow().as_ref() {
            let _ = tx.send(event);
        }
    });
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 && wparam.0 as u32 == WM_MOUSEWHEEL {
        let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
        if let Some(direction) = WheelDirection::from_delta(wheel_delta(info.mouseData)) {
            emit(InputEvent::Wheel(WheelEvent {
                x: info.pt.x,
                y: info.pt.y,
                direction,
                screen_height: GetSystemMetrics(SM_CYSCREEN),
            }));
        }
    }
    CallNextHookEx(HOOK.with(Cell::get), code, wparam, lparam)
}

/// Handle onto the input thread.  Doubles as the process's
/// [`HotkeyRegistrar`].
pub struct InputThread {
    thread_id: u32,
    requests: mpsc::Sender<Request>,
}

impl InputThread {
    /// Start the input thread.  Hotkeys and, when `capture_wheel` is set,
    /// wheel notches are sent to `events`.
    pub fn spawn(events: mpsc::Sender<InputEvent>, capture_wheel: bool) -> io::Result<Self> {
        let (req_tx, req_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<io::Result<u32>>(1);
        thread::Builder::new()
            .name("input".into())
            .spawn(move || run(events, capture_wheel, req_rx, ready_tx))?;
        let thread_id = ready_rx
            .recv()
            .map_err(|_| io::Error::other("input thread exited early"))??;
        Ok(Self {
            thread_id,
            requests: req_tx,
        })
    }

    fn post(&self, request: Request) -> bool {
        if self.requests.send(request).is_err() {
            return false;
        }
        match unsafe { PostThreadMessageW(self.thread_id, WM_INPUT_REQUEST, WPARAM(0), LPARAM(0)) }
        {
            Ok(()) => true,
            Err(e) => {
                warn!("could not reach the input thread: {}", e);
                false
            }
        }
    }
}

impl HotkeyRegistrar for InputThread {
    fn register(&mut self, shortcut: &Shortcut) -> bool {
        let (tx, rx) = mpsc::sync_channel(1);
        self.post(Request::Register(*shortcut, tx)) && rx.recv().unwrap_or(false)
    }

    fn unregister_all(&mut self) {
        let (tx, rx) = mpsc::sync_channel(1);
        if self.post(Request::UnregisterAll(tx)) {
            let _ = rx.recv();
        }
    }
}

impl Drop for InputThread {
    fn drop(&mut self) {
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
    }
}

/// Registered hotkey ids, in registration order.
#[derive(Default)]
struct Registrations {
    ids: Vec<i32>,
    next_id: i32,
}

impl Registrations {
    fn register(&mut self, shortcut: &Shortcut) -> bool {
        let id = self.next_id + 1;
        let modifiers = HOT_KEY_MODIFIERS((shortcut.modifiers | Modifiers::NOREPEAT).bits());
        match unsafe { RegisterHotKey(HWND::default(), id, modifiers, shortcut.key.0 as u32) } {
            Ok(()) => {
                self.next_id = id;
                self.ids.push(id);
                debug!("registered {} as hotkey {}", shortcut, id);
                true
            }
            Err(e) => {
                debug!("could not register {}: {}", shortcut, e);
                false
            }
        }
    }

    fn unregister_all(&mut self) {
        for id in self.ids.drain(..) {
            unsafe {
                let _ = UnregisterHotKey(HWND::default(), id);
            }
        }
    }
}

fn install_wheel_hook() -> windows::core::Result<HHOOK> {
    unsafe {
        let module = GetModuleHandleW(PCWSTR(std::ptr::null()))?;
        SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), module, 0)
    }
}

fn run(
    events: mpsc::Sender<InputEvent>,
    capture_wheel: bool,
    requests: mpsc::Receiver<Request>,
    ready: mpsc::SyncSender<io::Result<u32>>,
) {
    let mut msg = MSG::default();
    // Create the message queue before anyone posts to it.
    unsafe {
        let _ = PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_NOREMOVE);
    }
    EVENTS.with(|e| *e.borrow_mut() = Some(events));

    if capture_wheel {
        match install_wheel_hook() {
            Ok(hook) => HOOK.with(|h| h.set(hook)),
            Err(e) => warn!("could not install the wheel hook: {}", e),
        }
    }

    let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));

    let mut registrations = Registrations::default();
    unsafe {
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {
            match msg.message {
                WM_HOTKEY => {
                    let shortcut = decode_hotkey(msg.lParam.0);
                    trace!("hotkey {}", shortcut);
                    emit(InputEvent::Hotkey(shortcut));
                }
                WM_INPUT_REQUEST => {
                    while let Ok(request) = requests.try_recv() {
                        match request {
                            Request::Register(shortcut, reply) => {
                                let _ = reply.send(registrations.register(&shortcut));
                            }
                            Request::UnregisterAll(reply) => {
                                registrations.unregister_all();
                                let _ = reply.send(());
                            }
                        }
                    }
                }
                _ => {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
        }
    }

    registrations.unregister_all();
    let hook = HOOK.with(Cell::get);
    if !hook.0.is_null() {
        unsafe {
            let _ = UnhookWindowsHookEx(hook);
        }
    }
    debug!("input thread exited");
}
