//! **deskjump**: hotkey-driven virtual desktop switching for Windows.
//!
//! Global shortcuts jump straight to a numbered desktop, cycle through a
//! group of desktops, or carry the focused window to another desktop.  The
//! mouse wheel over the taskbar can step through desktops as well.
//!
//! # Architecture
//!
//! The crate is organised around a few capability traits in [`traits`]:
//!
//! * [`traits::DesktopService`]: the OS virtual desktop service, whose COM
//!   contract differs per Windows build (see [`version`]).
//! * [`traits::ShellHost`]: the `explorer.exe` process hosting that service.
//! * [`traits::HotkeyRegistrar`] and [`traits::FocusShim`]: global hotkeys
//!   and the focus workaround around switches.
//!
//! The [`executor`] confines the desktop service to one thread, the
//! [`monitor`] watches the shell host, and the [`orchestrator`] routes
//! [`command::InputEvent`]s between them.  Concrete implementations live in
//! [`platform`].

pub mod command;
pub mod config;
pub mod executor;
pub mod history;
pub mod monitor;
pub mod orchestrator;
pub mod platform;
pub mod shortcut;
pub mod traits;
pub mod version;
pub mod wheel;

#[cfg(test)]
mod test_support;
