//! Single-instance guard.

use log::debug;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE, HWND};
use windows::Win32::System::Threading::{CreateMutexW, ReleaseMutex};
use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONINFORMATION, MB_OK};

/// Holds the named mutex that marks a running deskjump.
pub struct SingleInstance {
    handle: HANDLE,
}

impl SingleInstance {
    /// Take the guard, or return `None` if another instance holds it.
    pub fn acquire() -> std::io::Result<Option<Self>> {
        let handle = unsafe { CreateMutexW(None, true, w!("Local\\deskjump-single-instance")) }?;
        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Ok(None);
        }
        debug!("single-instance guard acquired");
        Ok(Some(Self { handle }))
    }
}

impl Drop for SingleInstance {
    fn drop(&mut self) {
        unsafe {
            let _ = ReleaseMutex(self.handle);
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Tell the user, who probably launched us twice, that nothing happened.
pub fn show_already_running() {
    unsafe {
        let _ = MessageBoxW(
            HWND::default(),
            w!("deskjump is already running."),
            PCWSTR::null(),
            MB_OK | MB_ICONINFORMATION,
        );
    }
}
