//! Desktop history and toggle-group rotation.
//!
//! [`DesktopHistory`] remembers the active desktop, the one before it, and
//! the current UI theme.  It is updated from the desktop-changed and theme
//! callbacks only, so it always reflects what the OS reports rather than
//! what deskjump asked for.

/// Active and previous desktop plus the UI theme.
///
/// Desktop indices are 0-based.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopHistory {
    /// Active desktop.
    current: usize,
    /// Desktop that was active before `current`, if any change was seen.
    last: Option<usize>,
    /// Whether the system uses the light theme.
    light_mode: bool,
}

impl DesktopHistory {
    /// Create an empty history positioned at desktop 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the active desktop without touching `last`.
    ///
    /// Used once at startup, before any change notification arrives.
    pub fn seed(&mut self, current: usize) {
        self.current = current;
    }

    /// Record a desktop change: the current desktop becomes the last one.
    pub fn record_change(&mut self, new_current: usize) {
        self.last = Some(self.current);
        self.current = new_current;
    }

    /// Record the theme; returns `true` if it differs from the cached value.
    pub fn set_light_mode(&mut self, light: bool) -> bool {
        let changed = self.light_mode != light;
        self.light_mode = light;
        changed
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn last(&self) -> Option<usize> {
        self.last
    }

    pub fn light_mode(&self) -> bool {
        self.light_mode
    }
}

/// Next desktop in a toggle group.
///
/// If `current` is a member, the entry after it (wrapping around) is
/// returned.  If it is not, rotation starts as if `current` were the first
/// member, so the second entry is returned.  `None` for an empty group.
pub fn next_in_group(group: &[usize], current: usize) -> Option<usize> {
    if group.is_empty() {
        return None;
    }
    let pos = group.iter().position(|d| *d == current).unwrap_or(0);
    Some(group[(pos + 1) % group.len()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_history_starts_at_zero_without_last() {
        let h = DesktopHistory::new();
        assert_eq!(h.current(), 0);
        assert_eq!(h.last(), None);
        assert!(!h.light_mode());
    }

    #[test]
    fn seed_does_not_touch_last() {
        let mut h = DesktopHistory::new();
        h.seed(3);
        assert_eq!(h.current(), 3);
        assert_eq!(h.last(), None);
    }

    #[test]
    fn change_shifts_current_into_last() {
        let mut h = DesktopHistory::new();
        h.seed(2);
        h.record_change(5);
        assert_eq!((h.current(), h.last()), (5, Some(2)));
        h.record_change(1);
        assert_eq!((h.current(), h.last()), (1, Some(5)));
    }

    #[test]
    fn theme_change_detection() {
        let mut h = DesktopHistory::new();
        assert!(!h.set_light_mode(false));
        assert!(h.set_light_mode(true));
        assert!(!h.set_light_mode(true));
        assert!(h.light_mode());
    }

    #[test]
    fn toggle_group_rotates() {
        // Desktops 2, 4, 6 (0-based 1, 3, 5).
        let group = [1, 3, 5];
        assert_eq!(next_in_group(&group, 3), Some(5));
        assert_eq!(next_in_group(&group, 5), Some(1));
        assert_eq!(next_in_group(&group, 1), Some(3));
    }

    #[test]
    fn toggle_group_from_outside_goes_to_second_member() {
        let group = [1, 3, 5];
        assert_eq!(next_in_group(&group, 0), Some(3));
    }

    #[test]
    fn toggle_group_single_member_stays() {
        assert_eq!(next_in_group(&[4], 4), Some(4));
        assert_eq!(next_in_group(&[4], 0), Some(4));
    }

    #[test]
    fn empty_group_has_no_next() {
        assert_eq!(next_in_group(&[], 0), None);
    }
}
