//! The shell host (`explorer.exe`) and its broadcast messages.
//!
//! [`ExplorerHost`] implements [`ShellHost`] on top of a process snapshot
//! and `taskkill`; the theme comes from the user's registry hive.
//! [`spawn_signal_window`] runs a hidden top-level window whose only job is
//! to receive the `TaskbarCreated` and `WM_SETTINGCHANGE` broadcasts and
//! forward them as [`ShellSignal`]s.

use super::{from_wide, registry, wide};
use crate::monitor::ShellSignal;
use crate::traits::ShellHost;
use log::{debug, warn};
use std::cell::RefCell;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::ptr::null_mut;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DispatchMessageW, GetMessageW, RegisterClassW,
    RegisterWindowMessageW, TranslateMessage, MSG, WINDOW_EX_STYLE, WM_SETTINGCHANGE, WNDCLASSW,
    WS_OVERLAPPED,
};

const HOST_EXE: &str = "explorer.exe";
const PERSONALIZE_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Themes\Personalize";

/// How long [`ExplorerHost::kill`] waits for the process to disappear.
const KILL_WAIT: Duration = Duration::from_secs(10);

/// The Windows shell host.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplorerHost;

impl ExplorerHost {
    fn executable() -> PathBuf {
        let root = std::env::var_os("SystemRoot")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Windows"));
        root.join(HOST_EXE)
    }
}

impl ShellHost for ExplorerHost {
    fn is_running(&self) -> bool {
        unsafe {
            let snapshot = match CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) {
                Ok(s) => s,
                Err(e) => {
                    // Unknown counts as running.
                    warn!("process snapshot failed: {}", e);
                    return true;
                }
            };
            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };
            let mut found = false;
            let mut more = Process32FirstW(snapshot, &mut entry).is_ok();
            while more {
                if from_wide(&entry.szExeFile).eq_ignore_ascii_case(HOST_EXE) {
                    found = true;
                    break;
                }
                more = Process32NextW(snapshot, &mut entry).is_ok();
            }
            let _ = CloseHandle(snapshot);
            found
        }
    }

    fn launch(&self) -> io::Result<()> {
        let exe = Self::executable();
        debug!("launching {}", exe.display());
        Command::new(exe).spawn().map(|_| ())
    }

    fn kill(&self) -> io::Result<()> {
        let status = Command::new("taskkill")
            .args(["/f", "/im", HOST_EXE])
            .status()?;
        if !status.success() {
            warn!("taskkill exited with {}", status);
        }

        let deadline = Instant::now() + KILL_WAIT;
        while self.is_running() {
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "shell host did not exit",
                ));
            }
            thread::sleep(Duration::from_millis(100));
        }
        Ok(())
    }

    fn is_light_theme(&self) -> bool {
        registry::read_current_user_dword(PERSONALIZE_KEY, "SystemUsesLightTheme")
            .map(|v| v == 1)
            .unwrap_or(false)
    }
}

//  Broadcast listener

struct SignalSink {
    taskbar_created: u32,
    tx: mpsc::Sender<ShellSignal>,
}

thread_local! {
    static SINK: RefCell<Option<SignalSink>> = const { RefCell::new(None) };
}

unsafe extern "system" fn signal_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let handled = SINK.with(|sink| {
        let sink = sink.borrow();
        let Some(sink) = sink.as_ref() else {
            return false;
        };
        let signal = if sink.taskbar_created != 0 && msg == sink.taskbar_created {
            ShellSignal::HostReady
        } else if msg == WM_SETTINGCHANGE {
            ShellSignal::SettingsChanged
        } else {
            return false;
        };
        let _ = sink.tx.send(signal);
        true
    });
    if handled {
        LRESULT(0)
    } else {
        DefWindowProcW(hwnd, msg, wparam, lparam)
    }
}

unsafe fn create_signal_window(tx: mpsc::Sender<ShellSignal>) -> windows::core::Result<HWND> {
    let taskbar_created = RegisterWindowMessageW(w!("TaskbarCreated"));
    if taskbar_created == 0 {
        warn!("could not register TaskbarCreated, shell restarts will go unnoticed");
    }
    SINK.with(|sink| {
        *sink.borrow_mut() = Some(SignalSink {
            taskbar_created,
            tx,
        })
    });

    let instance = GetModuleHandleW(PCWSTR(std::ptr::null()))?;
    let class_name = wide("deskjump_shell_signals");
    let wc = WNDCLASSW {
        lpfnWndProc: Some(signal_proc),
        hInstance: instance.into(),
        lpszClassName: PCWSTR(class_name.as_ptr()),
        ..Default::default()
    };
    RegisterClassW(&wc);

    // Top-level but never shown; message-only windows miss broadcasts.
    CreateWindowExW(
        WINDOW_EX_STYLE::default(),
        PCWSTR(class_name.as_ptr()),
        w!("deskjump"),
        WS_OVERLAPPED,
        0,
        0,
        0,
        0,
        None,
        None,
        instance,
        None,
    )
}

/// Start the broadcast listener thread, forwarding to `tx`.
///
/// Returns once the window exists, so no broadcast sent after this call is
/// missed.
pub fn spawn_signal_window(tx: mpsc::Sender<ShellSignal>) -> io::Result<()> {
    let (ready_tx, ready_rx) = mpsc::sync_channel::<io::Result<()>>(1);
    thread::Builder::new()
        .name("shell-signals".into())
        .spawn(move || {
            if let Err(e) = unsafe { create_signal_window(tx) } {
                let _ = ready_tx.send(Err(io::Error::from(e)));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            let mut msg = MSG::default();
            unsafe {
                while GetMessageW(&mut msg, HWND(null_mut()), 0, 0).0 > 0 {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
            debug!("shell signal window exited");
        })?;
    ready_rx
        .recv()
        .map_err(|_| io::Error::other("shell signal thread exited early"))?
}
