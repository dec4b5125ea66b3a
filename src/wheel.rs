//! Mouse-wheel desktop switching over the taskbar.
//!
//! Wheel events anywhere on screen are reported by the input hook; only the
//! ones inside a horizontal band at the bottom of the screen (where the
//! taskbar sits) switch desktops.  Up goes to the next desktop, down to the
//! previous one.

/// Height in pixels of the band at the bottom of the screen that reacts to
/// the wheel.
pub const TASKBAR_BAND: i32 = 50;

/// Wheel rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDirection {
    Up,
    Down,
}

impl WheelDirection {
    /// Direction from a raw wheel delta (positive is away from the user).
    pub fn from_delta(delta: i16) -> Option<WheelDirection> {
        match delta {
            d if d > 0 => Some(WheelDirection::Up),
            d if d < 0 => Some(WheelDirection::Down),
            _ => None,
        }
    }
}

/// A wheel notch at screen position `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelEvent {
    pub x: i32,
    pub y: i32,
    pub direction: WheelDirection,
    /// Height of the primary screen when the event was captured.
    pub screen_height: i32,
}

impl WheelEvent {
    /// Whether the pointer was over the taskbar band.
    pub fn in_taskbar_band(&self) -> bool {
        self.y >= self.screen_height - TASKBAR_BAND
    }

    /// Desktop to switch to from `current`, or `None` when scrolling down
    /// on the first desktop.
    ///
    /// Scrolling up past the last desktop is not clamped here; the desktop
    /// service ignores out-of-range jumps.
    pub fn target_from(&self, current: usize) -> Option<usize> {
        match self.direction {
            WheelDirection::Up => current.checked_add(1),
            WheelDirection::Down => current.checked_sub(1),
        }
    }
}
