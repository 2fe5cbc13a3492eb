//! Protocol versions.
//!
//! An identity records the protocol version it was created or serialized
//! under. The codec consults it to decide which field layouts apply. Versions
//! travel on the wire as a single numeric id:
//! `major * 1_000_000 + minor * 10_000 + patch * 100 + 99`.

use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` protocol version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    id: u32,
}

/// From this version on, API key role descriptors travel as raw JSON bytes
/// instead of a structured map.
pub const VERSION_API_KEY_ROLES_AS_BYTES: Version = Version::new(7, 9, 0);

impl Version {
    /// The version this build speaks.
    pub const CURRENT: Version = Version::new(8, 1, 0);

    /// Oldest version whose identities this build can still decode.
    pub const MINIMUM_COMPATIBLE: Version = Version::new(7, 0, 0);

    /// `minor` and `patch` must be at most 99; larger values would alias
    /// other versions on the wire. Use [`Version::try_new`] for untrusted
    /// components.
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        assert!(minor <= 99 && patch <= 99, "version minor and patch must be at most 99");
        Self {
            id: major as u32 * 1_000_000 + minor as u32 * 10_000 + patch as u32 * 100 + 99,
        }
    }

    pub const fn try_new(major: u8, minor: u8, patch: u8) -> Option<Self> {
        if minor > 99 || patch > 99 {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// Rebuild from a wire id. Ids that don't decompose into
    /// `major.minor.patch` components are rejected.
    pub fn from_id(id: u32) -> Option<Self> {
        let major = id / 1_000_000;
        if major > u8::MAX as u32 {
            return None;
        }
        let v = Self::new(major as u8, ((id / 10_000) % 100) as u8, ((id / 100) % 100) as u8);
        (v.id == id).then_some(v)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn major(&self) -> u8 {
        (self.id / 1_000_000) as u8
    }

    pub fn minor(&self) -> u8 {
        ((self.id / 10_000) % 100) as u8
    }

    pub fn patch(&self) -> u8 {
        ((self.id / 100) % 100) as u8
    }

    /// Whether identities of this version can be decoded by this build.
    pub fn is_compatible(&self) -> bool {
        *self >= Self::MINIMUM_COMPATIBLE && *self <= Self::CURRENT
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// Error parsing a version string.
#[derive(Debug, thiserror::Error)]
#[error("invalid version '{0}': expected major.minor.patch")]
pub struct VersionParseError(String);

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError(s.to_string());
        let mut parts = s.trim().splitn(3, '.');
        let mut next = || -> Result<u8, VersionParseError> {
            parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)
        };
        let (major, minor, patch) = (next()?, next()?, next()?);
        Self::try_new(major, minor, patch).ok_or_else(err)
    }
}

// ============================================================================
// Tests
// ============================================================================
