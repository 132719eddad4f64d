//! Resource version tracking.
//!
//! Versions are issued by the snapshot cache, one counter per node. They are
//! rendered on the wire as decimal strings. Version `0` is the empty
//! version: nothing has been published yet.

use std::fmt;

/// Version identifier for a resource type within a snapshot.
///
/// Versions are totally ordered and strictly increase per node each time
/// the content of a resource type changes.
///
/// # Example
///
/// ```rust
/// use kourier_core::ResourceVersion;
///
/// let v1 = ResourceVersion::new(1);
/// let v2 = v1.next();
///
/// assert!(v2 > v1);
/// assert!(ResourceVersion::empty().is_empty());
/// assert_eq!(ResourceVersion::parse("2"), Some(v2));
/// assert_eq!(ResourceVersion::parse(""), None);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceVersion(u64);

impl ResourceVersion {
    /// Create a version from its counter value.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// The empty version (nothing published yet).
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if the version is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The version following this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Get the counter value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse a version as sent back by a proxy in `version_info`.
    ///
    /// Returns `None` for the empty string and for versions this control
    /// plane could not have issued.
    #[must_use]
    pub fn parse(version_info: &str) -> Option<Self> {
        version_info
            .parse::<u64>()
            .ok()
            .filter(|v| *v != 0)
            .map(Self)
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            Ok(())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u64> for ResourceVersion {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
