//! Protocol versions negotiated per channel.
//!
//! A version is a totally ordered release identifier. The transport layer
//! negotiates one per connection (or records one per persisted file) and both
//! channel ends must be configured with it. A handful of codec behaviors
//! branch on the version so that adjacent releases stay wire-compatible
//! during rolling upgrades.

/// An ordered protocol release identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u32);

impl Version {
    /// Oldest release this codec can still talk to.
    pub const MINIMUM_COMPATIBLE: Version = Version(4_00_00);

    /// First release that writes zoned timestamps with the current tag.
    pub const ZONED_TIMESTAMP: Version = Version(4_02_00);

    /// The release this build ships with.
    pub const CURRENT: Version = Version(4_06_00);

    /// Build a version from its raw release identifier.
    pub const fn from_id(id: u32) -> Self {
        Version(id)
    }

    /// The raw release identifier.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// True if this version is at or after `other`.
    pub fn on_or_after(self, other: Version) -> bool {
        self >= other
    }

    /// True if this version is strictly before `other`.
    pub fn before(self, other: Version) -> bool {
        self < other
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::CURRENT
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let major = self.0 / 10_000;
        let minor = (self.0 / 100) % 100;
        let patch = self.0 % 100;
        write!(f, "{major}.{minor}.{patch}")
    }
}
