//! Package version parsing and ordering.
//!
//! Package feeds use NuGet-style versions: two to four numeric parts plus an
//! optional pre-release label (`1.0`, `2.1.3`, `4.0.0.1`, `3.0.0-Beta.2`).
//! These are normalized onto [`semver::Version`] so ordering follows semantic
//! versioning, with the fourth "revision" part compared last.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A normalized, totally-ordered package version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    semver: semver::Version,
    revision: u64,
}

/// Error returned when a version string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid package version '{input}': {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: String,
}

impl PackageVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            semver: semver::Version::new(major, minor, patch),
            revision: 0,
        }
    }

    pub fn major(&self) -> u64 {
        self.semver.major
    }

    pub fn minor(&self) -> u64 {
        self.semver.minor
    }

    pub fn is_prerelease(&self) -> bool {
        !self.semver.pre.is_empty()
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.semver
    }
}

impl FromStr for PackageVersion {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| VersionParseError {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        // Pre-release labels compare case-insensitively.
        let trimmed = input.trim().trim_start_matches(['v', 'V']).to_ascii_lowercase();
        if trimmed.is_empty() {
            return Err(fail("empty version"));
        }

        let (core, build) = match trimmed.split_once('+') {
            Some((core, build)) => (core, Some(build)),
            None => (trimmed.as_str(), None),
        };
        let (numeric, pre) = match core.split_once('-') {
            Some((numeric, pre)) => (numeric, Some(pre)),
            None => (core, None),
        };

        let parts = numeric
            .split('.')
            .map(|p| p.parse::<u64>().map_err(|_| fail("non-numeric component")))
            .collect::<Result<Vec<_>, _>>()?;
        if parts.is_empty() || parts.len() > 4 {
            return Err(fail("expected one to four numeric components"));
        }

        let component = |i: usize| parts.get(i).copied().unwrap_or(0);
        let mut normalized = format!("{}.{}.{}", component(0), component(1), component(2));
        if let Some(pre) = pre {
            normalized.push('-');
            normalized.push_str(pre);
        }
        if let Some(build) = build {
            normalized.push('+');
            normalized.push_str(build);
        }

        let semver = semver::Version::parse(&normalized).map_err(|e| fail(&e.to_string()))?;
        Ok(Self {
            semver,
            revision: component(3),
        })
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let core = |v: &semver::Version| (v.major, v.minor, v.patch);
        core(&self.semver)
            .cmp(&core(&other.semver))
            .then(self.revision.cmp(&other.revision))
            .then_with(|| self.semver.pre.cmp(&other.semver.pre))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.semver;
        write!(f, "{}.{}.{}", v.major, v.minor, v.patch)?;
        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !v.pre.is_empty() {
            write!(f, "-{}", v.pre)?;
        }
        Ok(())
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
