//! Win32 and shell COM implementations.

pub mod desktop;
pub mod focus;
pub mod input;
pub mod instance;
pub mod registry;
pub mod shell;

use std::iter::once;

/// NUL-terminated UTF-16 copy of `s`, for `PCWSTR` arguments.
pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(once(0)).collect()
}

/// Decode a NUL-terminated UTF-16 buffer.
pub(crate) fn from_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_round_trips_through_nul() {
        let w = wide("explorer.exe");
        assert_eq!(w.last(), Some(&0));
        assert_eq!(from_wide(&w), "explorer.exe");
    }
}
