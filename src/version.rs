//! OS version detection and desktop-service backend selection.
//!
//! The virtual desktop service is private and its COM contract changes
//! between Windows builds, sometimes within a build at a specific revision.
//! Each contract is a [`BackendVariant`]; [`BackendVariant::for_version`]
//! maps the running OS to one through a descending threshold table.

use std::fmt;

/// Windows build and update revision (`CurrentBuildNumber` / `UBR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OsVersion {
    pub build: u32,
    pub revision: u32,
}

impl OsVersion {
    pub fn new(build: u32, revision: u32) -> Self {
        Self { build, revision }
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.build, self.revision)
    }
}

/// One incompatible generation of the virtual desktop COM contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendVariant {
    /// Windows 10 from build 17763 up to the Windows 11 contract.
    Windows10_17763,
    /// Windows 11 build 22631, revision 3085 and later.
    Windows11_22631_3085,
}

impl fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendVariant::Windows10_17763 => write!(f, "windows10-17763"),
            BackendVariant::Windows11_22631_3085 => write!(f, "windows11-22631.3085"),
        }
    }
}

/// Minimum `(build, revision)` for each variant, newest first.
const BACKEND_TABLE: &[(OsVersion, BackendVariant)] = &[
    (
        OsVersion { build: 22631, revision: 3085 },
        BackendVariant::Windows11_22631_3085,
    ),
    (
        OsVersion { build: 17763, revision: 0 },
        BackendVariant::Windows10_17763,
    ),
];

impl BackendVariant {
    /// The newest contract, used when nothing in the table matches.
    pub const NEWEST: BackendVariant = BackendVariant::Windows11_22631_3085;

    /// Pick the backend for `version`.
    ///
    /// An entry matches when the build **and** the revision are both at or
    /// above its thresholds; the first match wins.  Versions older than
    /// every entry fall back to [`NEWEST`](Self::NEWEST), on the theory that
    /// unknown systems are more likely to be new ones.
    pub fn for_version(version: OsVersion) -> BackendVariant {
        BACKEND_TABLE
            .iter()
            .find(|(min, _)| version.build >= min.build && version.revision >= min.revision)
            .map(|(_, variant)| *variant)
            .unwrap_or(Self::NEWEST)
    }
}

#[cfg(windows)]
impl OsVersion {
    /// Read the running OS version from the registry.
    pub fn detect() -> std::io::Result<OsVersion> {
        use crate::platform::windows::registry;

        const KEY: &str = r"SOFTWARE\Microsoft\Windows NT\CurrentVersion";
        let build = registry::read_local_machine_string(KEY, "CurrentBuildNumber")?;
        let build = build
            .trim()
            .parse::<u32>()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let revision = registry::read_local_machine_dword(KEY, "UBR")?;
        Ok(OsVersion { build, revision })
    }
}
