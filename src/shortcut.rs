//! Keyboard shortcuts: a set of modifiers plus exactly one key.
//!
//! Shortcuts are written as `+`-separated tokens, e.g. `"win+shift+d3"`.
//! Parsing is case-insensitive, ignores whitespace around tokens, and accepts
//! the modifiers in any order and position.  The canonical text form always
//! lists modifiers as `alt, ctrl, shift, win` followed by the key, so
//! `parse(s).to_string()` is stable.
//!
//! Modifier bits and key codes use the Win32 values (`MOD_*` flags and
//! virtual-key codes), so a [`Shortcut`] can be handed to the hotkey
//! registrar and compared against `WM_HOTKEY` payloads without translation.

use bitflags::bitflags;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Modifier keys held together with a [`Key`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const ALT = 0x0001;
        const CONTROL = 0x0002;
        const SHIFT = 0x0004;
        /// The primary OS key (the Windows logo key).
        const WIN = 0x0008;
        /// Suppress auto-repeat while the chord is held.  Only meaningful
        /// at registration time; never produced by [`Shortcut::parse`].
        const NOREPEAT = 0x4000;
    }
}

/// Canonical modifier order for display, with the accepted spellings.
const MODIFIER_NAMES: &[(Modifiers, &[&str])] = &[
    (Modifiers::ALT, &["alt"]),
    (Modifiers::CONTROL, &["ctrl", "control"]),
    (Modifiers::SHIFT, &["shift"]),
    (Modifiers::WIN, &["win"]),
];

fn modifier_from_name(name: &str) -> Option<Modifiers> {
    MODIFIER_NAMES
        .iter()
        .find(|(_, names)| names.contains(&name))
        .map(|(m, _)| *m)
}

/// A non-modifier key, identified by its Win32 virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub u16);

/// Named keys outside the letter, digit, and function-key ranges.  The
/// first name listed for a code is its canonical spelling.
const NAMED_KEYS: &[(&str, u16)] = &[
    ("back", 0x08),
    ("backspace", 0x08),
    ("tab", 0x09),
    ("enter", 0x0D),
    ("return", 0x0D),
    ("pause", 0x13),
    ("capslock", 0x14),
    ("escape", 0x1B),
    ("esc", 0x1B),
    ("space", 0x20),
    ("pageup", 0x21),
    ("pagedown", 0x22),
    ("end", 0x23),
    ("home", 0x24),
    ("left", 0x25),
    ("up", 0x26),
    ("right", 0x27),
    ("down", 0x28),
    ("printscreen", 0x2C),
    ("insert", 0x2D),
    ("delete", 0x2E),
    ("del", 0x2E),
    ("multiply", 0x6A),
    ("add", 0x6B),
    ("subtract", 0x6D),
    ("decimal", 0x6E),
    ("divide", 0x6F),
    ("semicolon", 0xBA),
    ("plus", 0xBB),
    ("comma", 0xBC),
    ("minus", 0xBD),
    ("period", 0xBE),
    ("slash", 0xBF),
    ("tilde", 0xC0),
    ("openbrackets", 0xDB),
    ("backslash", 0xDC),
    ("closebrackets", 0xDD),
    ("quotes", 0xDE),
];

const VK_0: u16 = 0x30;
const VK_A: u16 = 0x41;
const VK_NUMPAD0: u16 = 0x60;
const VK_F1: u16 = 0x70;

/// Parse a decimal suffix within `0..=max`.
fn numbered(rest: &str, max: u16) -> Option<u16> {
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse::<u16>().ok().filter(|n| *n <= max)
}

impl Key {
    /// Look up a key by name (already trimmed, any case).
    ///
    /// Digits are accepted both as `d0`..`d9` and as bare `0`..`9`.
    pub fn from_name(name: &str) -> Option<Key> {
        let name = name.to_ascii_lowercase();
        let bytes = name.as_bytes();

        if bytes.len() == 1 {
            let c = bytes[0];
            if c.is_ascii_lowercase() {
                return Some(Key(VK_A + u16::from(c - b'a')));
            }
            if c.is_ascii_digit() {
                return Some(Key(VK_0 + u16::from(c - b'0')));
            }
        }
        if let Some(d) = name.strip_prefix('d').and_then(|r| numbered(r, 9)) {
            if name.len() == 2 {
                return Some(Key(VK_0 + d));
            }
        }
        if let Some(n) = name.strip_prefix("numpad").and_then(|r| numbered(r, 9)) {
            return Some(Key(VK_NUMPAD0 + n));
        }
        if let Some(n) = name.strip_prefix('f').and_then(|r| numbered(r, 24)) {
            if n >= 1 {
                return Some(Key(VK_F1 + n - 1));
            }
        }
        NAMED_KEYS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, vk)| Key(*vk))
    }

    /// Canonical lowercase name, or `vk<code>` for codes with no name.
    pub fn name(&self) -> String {
        let vk = self.0;
        match vk {
            0x30..=0x39 => format!("d{}", vk - VK_0),
            0x41..=0x5A => ((b'a' + (vk - VK_A) as u8) as char).to_string(),
            0x60..=0x69 => format!("numpad{}", vk - VK_NUMPAD0),
            0x70..=0x87 => format!("f{}", vk - VK_F1 + 1),
            _ => NAMED_KEYS
                .iter()
                .find(|(_, code)| *code == vk)
                .map(|(n, _)| n.to_string())
                .unwrap_or_else(|| format!("vk{}", vk)),
        }
    }
}

/// Errors from [`Shortcut::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShortcutError {
    #[error("empty shortcut")]
    Empty,
    #[error("unknown key or modifier {token:?} in {input:?}")]
    UnknownToken { input: String, token: String },
    #[error("shortcut {0:?} has no key")]
    MissingKey(String),
    #[error("shortcut {0:?} has more than one key")]
    MultipleKeys(String),
}

/// A modifier set plus one key.
///
/// Equality compares both the modifiers and the key; use
/// [`modifiers_eq`](Shortcut::modifiers_eq) to compare the modifiers alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shortcut {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl Shortcut {
    pub fn new(modifiers: Modifiers, key: Key) -> Self {
        Self { modifiers, key }
    }

    /// Parse a shortcut like `"Shift + Win + D1"`.
    pub fn parse(s: &str) -> Result<Self, ShortcutError> {
        if s.trim().is_empty() {
            return Err(ShortcutError::Empty);
        }

        let mut modifiers = Modifiers::empty();
        let mut key = None;

        for raw in s.split('+') {
            let token = raw.trim().to_ascii_lowercase();
            if let Some(m) = modifier_from_name(&token) {
                modifiers |= m;
                continue;
            }
            match Key::from_name(&token) {
                Some(_) if key.is_some() => {
                    return Err(ShortcutError::MultipleKeys(s.to_string()));
                }
                Some(k) => key = Some(k),
                None => {
                    return Err(ShortcutError::UnknownToken {
                        input: s.to_string(),
                        token: raw.trim().to_string(),
                    });
                }
            }
        }

        let key = key.ok_or_else(|| ShortcutError::MissingKey(s.to_string()))?;
        Ok(Self { modifiers, key })
    }

    /// `true` when both shortcuts hold the same modifiers, whatever the key.
    ///
    /// The no-repeat flag is not part of the comparison.
    pub fn modifiers_eq(&self, other: &Shortcut) -> bool {
        self.modifiers.difference(Modifiers::NOREPEAT)
            == other.modifiers.difference(Modifiers::NOREPEAT)
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (m, names) in MODIFIER_NAMES {
            if self.modifiers.contains(*m) {
                write!(f, "{}+", names[0])?;
            }
        }
        write!(f, "{}", self.key.name())
    }
}

impl std::str::FromStr for Shortcut {
    type Err = ShortcutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shortcut::parse(s)
    }
}

impl Serialize for Shortcut {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Shortcut {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Shortcut::parse(&s).map_err(DeError::custom)
    }
}
