//! Core traits that decouple deskjump from the Windows shell.
//!
//! The [`Orchestrator`](crate::orchestrator::Orchestrator) and the
//! [`SerializedExecutor`](crate::executor::SerializedExecutor) only see these
//! capabilities.  The Win32/COM implementations live in
//! [`platform::windows`](crate::platform); tests use the recording mocks in
//! `test_support`.

use crate::shortcut::Shortcut;

/// Error raised by a [`DesktopService`] backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("desktop service error: {0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Callback fired with the new 0-based desktop index whenever the active
/// desktop changes, whoever caused the change.
pub type DesktopChangedHandler = Box<dyn Fn(usize) + Send>;

/// Uniform access to the OS virtual desktop service.
///
/// All indices are 0-based.  Implementations are **not** thread-safe: they
/// are created, used, and dropped on the executor's worker thread only.
pub trait DesktopService {
    /// Index of the active desktop.
    fn current_desktop(&mut self) -> Result<usize, ServiceError>;

    /// Number of desktops that currently exist.
    fn desktop_count(&mut self) -> Result<usize, ServiceError>;

    /// Switch to desktop `index`.  An index past the last desktop is a
    /// no-op, not an error.
    fn jump_to(&mut self, index: usize) -> Result<(), ServiceError>;

    /// Move the foreground window to desktop `index`.
    fn move_focused_window_to(&mut self, index: usize) -> Result<(), ServiceError>;

    /// Append a new desktop.
    fn create_desktop(&mut self) -> Result<(), ServiceError>;

    /// Install the desktop-changed handler, replacing any previous one.
    fn subscribe(&mut self, handler: DesktopChangedHandler) -> Result<(), ServiceError>;

    /// Dispatch pending notifications.  Called by the worker between jobs.
    fn pump(&mut self) {}
}

/// Foreground-focus recovery around a desktop switch.
///
/// The shell sometimes leaves keyboard focus on a window from the previous
/// desktop.  Grabbing the foreground before the switch and handing it to the
/// desktop afterwards avoids that.  Both steps are best effort.
pub trait FocusShim: Send + Sync {
    /// Called on the worker thread right before the switch.
    fn claim_foreground(&self);
    /// Called on the worker thread right after the switch.
    fn settle_foreground(&self);
}

/// A [`FocusShim`] that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFocusShim;

impl FocusShim for NoFocusShim {
    fn claim_foreground(&self) {}
    fn settle_foreground(&self) {}
}

/// Global hotkey registration.
pub trait HotkeyRegistrar {
    /// Register `shortcut` system-wide (with auto-repeat suppressed).
    /// Returns `false` if another program already owns it.
    fn register(&mut self, shortcut: &Shortcut) -> bool;

    /// Drop every registration made through this registrar.
    fn unregister_all(&mut self);
}

/// Control over the shell host process (`explorer.exe`).
pub trait ShellHost: Send + Sync {
    /// Whether a host process is running.
    fn is_running(&self) -> bool;

    /// Start a new host process without waiting for it.
    fn launch(&self) -> std::io::Result<()>;

    /// Force-terminate the host and wait for it to exit.
    fn kill(&self) -> std::io::Result<()>;

    /// Whether the system UI uses the light theme.
    fn is_light_theme(&self) -> bool;
}
