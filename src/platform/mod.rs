//! OS bindings for the capability traits in [`traits`](crate::traits).
//!
//! Only Windows has a virtual desktop service to drive; everything in here
//! is compiled out elsewhere, which keeps the core testable on any host.

#[cfg(windows)]
pub mod windows;
