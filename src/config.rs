//! Application configuration.
//!
//! The configuration is a JSON file in the user's profile directory
//! (`%USERPROFILE%\.deskjump`).  It is read once at startup; editing it
//! requires a restart.  If the file does not exist it is created with the
//! defaults so the user has something to edit.
//!
//! # Example
//!
//! ```json
//! {
//!   "move-window-to": [
//!     { "shortcut": "win+shift+d1", "desktop": 1, "follow": true }
//!   ],
//!   "toggle-groups": [
//!     { "shortcut": "alt+w", "desktops": [1, 3, 5] }
//!   ],
//!   "jump-to": [
//!     { "shortcut": "win+d1", "desktop": 1 }
//!   ],
//!   "jump-current-goes-to-last": true,
//!   "change-desktops-with-scroll": false,
//!   "sticky-desktops": 4
//! }
//! ```
//!
//! Desktop numbers in the file are 1-based.

use crate::shortcut::{Key, Modifiers, Shortcut};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the configuration inside the profile directory.
pub const CONFIG_FILE_NAME: &str = ".deskjump";

/// Upper bound on desktops created per start by `sticky-desktops`.
pub const MAX_STICKY_DESKTOPS: u32 = 20;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Shortcuts that move the focused window to a desktop.
    #[serde(rename = "move-window-to")]
    pub move_window_to: Vec<MoveWindowTarget>,

    /// Shortcuts that cycle through a fixed list of desktops.
    #[serde(rename = "toggle-groups")]
    pub toggle_groups: Vec<ToggleGroup>,

    /// Shortcuts that jump straight to a desktop.
    #[serde(rename = "jump-to")]
    pub jump_to: Vec<JumpTarget>,

    /// Pressing the jump shortcut of the desktop you are already on takes
    /// you back to the previous one.
    #[serde(rename = "jump-current-goes-to-last")]
    pub jump_current_goes_to_last: bool,

    /// Scrolling the mouse wheel over the taskbar switches desktops.
    #[serde(rename = "change-desktops-with-scroll")]
    pub change_desktops_with_scroll: bool,

    /// Minimum number of desktops to keep around.  Missing desktops are
    /// created at startup; surplus ones are left alone.
    #[serde(rename = "sticky-desktops", default)]
    pub sticky_desktops: u32,
}

/// Jump to `desktop` when `shortcut` is pressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpTarget {
    pub shortcut: Shortcut,
    /// 1-based desktop number.
    pub desktop: i32,
}

/// Cycle through `desktops` when `shortcut` is pressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleGroup {
    pub shortcut: Shortcut,
    /// 1-based desktop numbers, visited in order.
    pub desktops: Vec<i32>,
    /// Also trigger on the digit keys `0`-`9` pressed with the same
    /// modifiers as `shortcut`.
    #[serde(rename = "modifiers-only", default)]
    pub modifiers_only: bool,
}

impl ToggleGroup {
    /// Every shortcut that cycles this group.
    ///
    /// A global hotkey only fires for registered keys, so a modifiers-only
    /// group spells out the keys it answers to: its own shortcut plus the
    /// digit row under the same modifiers.
    pub fn triggers(&self) -> Vec<Shortcut> {
        let mut out = vec![self.shortcut];
        if self.modifiers_only {
            for n in 0..10 {
                let digit = Shortcut::new(self.shortcut.modifiers, Key(0x30 + n));
                if !out.contains(&digit) {
                    out.push(digit);
                }
            }
        }
        out
    }

    /// Whether `pressed` cycles this group.
    pub fn matches(&self, pressed: &Shortcut) -> bool {
        self.triggers()
            .iter()
            .any(|t| t.key == pressed.key && t.modifiers_eq(pressed))
    }
}

/// Move the focused window to `desktop` when `shortcut` is pressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveWindowTarget {
    pub shortcut: Shortcut,
    /// 1-based desktop number.
    pub desktop: i32,
    /// Also switch to the target desktop after moving the window.
    #[serde(default)]
    pub follow: bool,
}

impl Default for Config {
    /// `win+1`..`win+9` jump to desktops 1-9 and `win+0` to desktop 10;
    /// adding `shift` moves the focused window there instead.
    fn default() -> Self {
        let digit = |n: u16| Key(0x30 + n);
        let desktop_of = |n: u16| if n == 0 { 10 } else { i32::from(n) };

        let jump_to = (0..10)
            .map(|n| JumpTarget {
                shortcut: Shortcut::new(Modifiers::WIN, digit(n)),
                desktop: desktop_of(n),
            })
            .collect();

        let move_window_to = (0..10)
            .map(|n| MoveWindowTarget {
                shortcut: Shortcut::new(Modifiers::WIN | Modifiers::SHIFT, digit(n)),
                desktop: desktop_of(n),
                follow: false,
            })
            .collect();

        Self {
            move_window_to,
            toggle_groups: Vec::new(),
            jump_to,
            jump_current_goes_to_last: true,
            change_desktops_with_scroll: false,
            sticky_desktops: 0,
        }
    }
}

/// Error from loading, parsing, or validating a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("shortcut {shortcut} is bound twice in {section}")]
    DuplicateShortcut {
        section: &'static str,
        shortcut: Shortcut,
    },
    #[error("desktop {desktop} in {section} is not a valid desktop number")]
    InvalidDesktop { section: &'static str, desktop: i32 },
    #[error("toggle group {0} has no desktops")]
    EmptyToggleGroup(Shortcut),
}

impl Config {
    /// Load and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration at `path`, falling back to [`Config::default`]
    /// if it cannot be read, parsed, or validated.
    ///
    /// A partially valid file is never used: one bad entry discards all of it.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cfg) => {
                info!("loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("{}; using default config", e);
                Self::default()
            }
        }
    }

    /// Write the default configuration to `path` unless a file already exists.
    ///
    /// Returns `true` when a file was created.
    pub fn ensure_file_exists(path: &Path) -> std::io::Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        let json = serde_json::to_string_pretty(&Self::default())
            .map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        info!("wrote default config to {}", path.display());
        Ok(true)
    }

    /// Default config location: `%USERPROFILE%\.deskjump`, or `$HOME/.deskjump`.
    pub fn default_location() -> PathBuf {
        let home = std::env::var_os("USERPROFILE")
            .or_else(|| std::env::var_os("HOME"))
            .unwrap_or_else(|| ".".into());
        PathBuf::from(home).join(CONFIG_FILE_NAME)
    }

    /// Check the invariants serde cannot express.
    ///
    /// Each section is checked on its own: the same shortcut may appear in
    /// `jump-to` and `toggle-groups`, in which case the jump wins at dispatch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unique("jump-to", self.jump_to.iter().map(|t| &t.shortcut))?;
        check_unique("toggle-groups", self.toggle_groups.iter().map(|g| &g.shortcut))?;
        check_unique("move-window-to", self.move_window_to.iter().map(|t| &t.shortcut))?;

        for t in &self.jump_to {
            check_desktop("jump-to", t.desktop)?;
        }
        for t in &self.move_window_to {
            check_desktop("move-window-to", t.desktop)?;
        }
        for g in &self.toggle_groups {
            if g.desktops.is_empty() {
                return Err(ConfigError::EmptyToggleGroup(g.shortcut));
            }
            for d in &g.desktops {
                check_desktop("toggle-groups", *d)?;
            }
        }
        Ok(())
    }

    /// Every distinct shortcut that needs a global hotkey registration.
    pub fn shortcuts(&self) -> Vec<Shortcut> {
        let mut out: Vec<Shortcut> = Vec::new();
        let all = self
            .jump_to
            .iter()
            .map(|t| t.shortcut)
            .chain(self.toggle_groups.iter().flat_map(|g| g.triggers()))
            .chain(self.move_window_to.iter().map(|t| t.shortcut));
        for s in all {
            if !out.contains(&s) {
                out.push(s);
            }
        }
        out
    }
}

fn check_unique<'a>(
    section: &'static str,
    shortcuts: impl Iterator<Item = &'a Shortcut>,
) -> Result<(), ConfigError> {
    let shortcuts: Vec<&Shortcut> = shortcuts.collect();
    for (i, a) in shortcuts.iter().enumerate() {
        if shortcuts[i + 1..].iter().any(|b| a == b) {
            return Err(ConfigError::DuplicateShortcut {
                section,
                shortcut: **a,
            });
        }
    }
    Ok(())
}

fn check_desktop(section: &'static str, desktop: i32) -> Result<(), ConfigError> {
    if desktop <= 0 {
        return Err(ConfigError::InvalidDesktop { section, desktop });
    }
    Ok(())
}
