//! Foreground-focus workaround around desktop switches.
//!
//! After a switch the shell sometimes keeps keyboard focus on a window that
//! stayed behind on the old desktop.  Handing the foreground to the desktop
//! window ("Program Manager") first, and minimizing it again afterwards,
//! makes the switch land with focus on the new desktop.

use crate::traits::FocusShim;
use log::trace;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::HWND;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::AttachThreadInput;
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowW, GetForegroundWindow, GetWindowThreadProcessId, SetForegroundWindow, ShowWindow,
    SW_MINIMIZE,
};

fn program_manager() -> Option<HWND> {
    unsafe { FindWindowW(PCWSTR::null(), w!("Program Manager")) }.ok()
}

/// [`FocusShim`] that routes focus through the desktop window.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgmanFocusShim;

impl FocusShim for ProgmanFocusShim {
    fn claim_foreground(&self) {
        let Some(progman) = program_manager() else {
            trace!("no Program Manager window");
            return;
        };
        unsafe {
            let desktop_thread = GetWindowThreadProcessId(progman, None);
            let foreground_thread = GetWindowThreadProcessId(GetForegroundWindow(), None);
            let current = GetCurrentThreadId();
            if desktop_thread == 0 || foreground_thread == 0 || foreground_thread == current {
                return;
            }
            let _ = AttachThreadInput(desktop_thread, current, true);
            let _ = AttachThreadInput(foreground_thread, current, true);
            let _ = SetForegroundWindow(progman);
            let _ = AttachThreadInput(foreground_thread, current, false);
            let _ = AttachThreadInput(desktop_thread, current, false);
        }
    }

    fn settle_foreground(&self) {
        if let Some(progman) = program_manager() {
            unsafe {
                let _ = ShowWindow(progman, SW_MINIMIZE);
            }
        }
    }
}
