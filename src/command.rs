//! Events and status messages shared between components.
//!
//! [`InputEvent`] is everything the [`Orchestrator`](crate::orchestrator::Orchestrator)
//! reacts to; the input thread and the shell monitor produce them over an
//! [`mpsc`](std::sync::mpsc) channel.  [`StatusUpdate`] goes the other way,
//! to whatever displays the active desktop (a tray icon, a log line).

use crate::shortcut::Shortcut;
use crate::wheel::WheelEvent;

/// Something the orchestrator has to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A registered global hotkey was pressed.
    Hotkey(Shortcut),
    /// The mouse wheel moved.
    Wheel(WheelEvent),
    /// The shell host came back after dying.  The desktop service handles
    /// held by this process are stale.
    HostRestarted,
}

/// What the event loop should do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Start a fresh copy of the process and exit this one.
    Relaunch,
}

/// Snapshot of what a status display needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Active desktop, 0-based.
    pub desktop: usize,
    /// Whether the system uses the light theme.
    pub light_mode: bool,
}

impl StatusUpdate {
    /// 1-based desktop number as shown to the user.
    pub fn desktop_number(&self) -> usize {
        self.desktop + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wheel::WheelDirection;

    #[test]
    fn desktop_number_is_one_based() {
        let s = StatusUpdate {
            desktop: 0,
            light_mode: true,
        };
        assert_eq!(s.desktop_number(), 1);
    }

    #[test]
    fn event_equality() {
        let a = Shortcut::parse("win+d1").unwrap();
        assert_eq!(InputEvent::Hotkey(a), InputEvent::Hotkey(a));
        assert_ne!(InputEvent::Hotkey(a), InputEvent::HostRestarted);
        let w = WheelEvent {
            x: 0,
            y: 0,
            direction: WheelDirection::Up,
            screen_height: 100,
        };
        assert_ne!(
            InputEvent::Wheel(w),
            InputEvent::Wheel(WheelEvent {
                direction: WheelDirection::Down,
                ..w
            })
        );
    }
}
