//! TS server protocol version, used to gate features by release.

use std::fmt;
use std::str::FromStr;

/// A TS server version string could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid TS server version: {input:?}")]
pub struct ApiVersionParseError {
    input: String,
}

/// Version reported by the TS server, ordered for feature gating.
///
/// The server announces its version during the handshake; individual
/// commands and argument shapes are only available from specific releases
/// onward (see the associated constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl ApiVersion {
    /// First release that accepts batched `updateOpen` requests.
    pub const V3_4_0: Self = Self::new(3, 4, 0);
    /// First release that reports syntax errors through `geterr` without
    /// requiring semantic support.
    pub const V4_4_0: Self = Self::new(4, 4, 0);

    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether this version is at least `other`.
    #[must_use]
    pub fn gte(self, other: Self) -> bool {
        self >= other
    }

    #[must_use]
    pub fn major(self) -> u32 {
        self.major
    }

    #[must_use]
    pub fn minor(self) -> u32 {
        self.minor
    }

    #[must_use]
    pub fn patch(self) -> u32 {
        self.patch
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ApiVersion {
    type Err = ApiVersionParseError;

    /// Parse a `major.minor[.patch]` version.
    ///
    /// Pre-release suffixes on the last component (e.g. `4.4.0-beta`) are
    /// ignored; the server reports them for insider builds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ApiVersionParseError {
            input: s.to_string(),
        };

        let numeric = s.split('-').next().unwrap_or_default();
        let mut parts = numeric.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(error)?;
        let minor = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(error)?;
        let patch = match parts.next() {
            Some(p) => p.parse().map_err(|_| error())?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(error());
        }
        Ok(Self::new(major, minor, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        let version: ApiVersion = "4.4.0".parse().unwrap();
        assert_eq!(version, ApiVersion::new(4, 4, 0));
    }

    #[test]
    fn test_parse_without_patch() {
        let version: ApiVersion = "3.4".parse().unwrap();
        assert_eq!(version, ApiVersion::V3_4_0);
    }

    #[test]
    fn test_parse_prerelease_suffix() {
        let version: ApiVersion = "4.4.0-beta".parse().unwrap();
        assert_eq!(version, ApiVersion::V4_4_0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<ApiVersion>().is_err());
        assert!("four".parse::<ApiVersion>().is_err());
        assert!("1.2.3.4".parse::<ApiVersion>().is_err());
        assert!("1.x".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(ApiVersion::V4_4_0.gte(ApiVersion::V3_4_0));
        assert!(!ApiVersion::V3_4_0.gte(ApiVersion::V4_4_0));
        assert!(ApiVersion::new(3, 4, 1).gte(ApiVersion::V3_4_0));
        assert!(ApiVersion::new(10, 0, 0).gte(ApiVersion::V4_4_0));
        assert!(!ApiVersion::new(2, 9, 9).gte(ApiVersion::V3_4_0));
    }

    #[test]
    fn test_display_roundtrip() {
        let version = ApiVersion::new(5, 1, 2);
        assert_eq!(version.to_string().parse::<ApiVersion>().unwrap(), version);
    }
}
