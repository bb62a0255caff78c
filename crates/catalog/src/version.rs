//! Catalog format versioning.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Version stamped into catalogs created by this engine.
pub const CATALOG_FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse "1.2.3", "v1.2.3" or "1.2". Pre-release and build suffixes
    /// ("1.2.3-rc1", "1.2.3+abc") are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed
            .split(|c| c == '-' || c == '+')
            .next()
            .unwrap_or_default();

        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self::new(major, minor, patch))
    }

    /// Version of the running engine.
    pub fn current() -> Self {
        Self::parse(CATALOG_FORMAT_VERSION).unwrap_or_default()
    }

    /// Catalogs are readable when major and minor components match.
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Fail unless a stored catalog version can be served by this engine.
pub fn check_compatible(db_version: &str) -> Result<()> {
    let incompatible = || CatalogError::IncompatibleVersion {
        found: db_version.to_string(),
        expected: CATALOG_FORMAT_VERSION.to_string(),
    };

    let found = Version::parse(db_version).ok_or_else(incompatible)?;
    if !found.is_compatible_with(&Version::current()) {
        return Err(incompatible());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Version::parse("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(Version::parse("v0.6.1"), Some(Version::new(0, 6, 1)));
        assert_eq!(Version::parse("2.0"), Some(Version::new(2, 0, 0)));
        assert_eq!(Version::parse("1.4.0-rc1"), Some(Version::new(1, 4, 0)));
        assert_eq!(Version::parse("banana"), None);
        assert_eq!(Version::parse("1.2.3.4"), None);
    }

    #[test]
    fn test_current_version_is_compatible() {
        assert!(check_compatible(CATALOG_FORMAT_VERSION).is_ok());
    }

    #[test]
    fn test_patch_difference_is_compatible() {
        let current = Version::current();
        let patched = Version::new(current.major, current.minor, current.patch + 7);
        assert!(check_compatible(&patched.to_string()).is_ok());
    }

    #[test]
    fn test_minor_difference_is_incompatible() {
        let current = Version::current();
        let newer = Version::new(current.major, current.minor + 1, 0);
        let err = check_compatible(&newer.to_string()).unwrap_err();
        assert!(matches!(err, CatalogError::IncompatibleVersion { .. }));
        assert!(check_compatible("garbage").is_err());
    }
}
