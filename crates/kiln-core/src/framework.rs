//! Target framework monikers and compatibility rules.
//!
//! A compiled artifact is built against a target framework (`net8.0`,
//! `netstandard2.0`, `net48`, ...). The session runs on one *active* framework
//! and can only load artifacts whose framework is compatible with it.

use crate::runtime::RuntimeIdentifier;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
pub enum FrameworkFamily {
    /// .NET 5 and later (`net5.0`, `net8.0-windows`).
    Net,
    /// .NET Core 1.0 - 3.1 (`netcoreapp3.1`).
    NetCoreApp,
    /// .NET Standard API surface (`netstandard2.0`).
    NetStandard,
    /// Classic .NET Framework (`net48`, `net472`).
    NetFramework,
}

/// A parsed target framework moniker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetFramework {
    family: FrameworkFamily,
    version: (u32, u32, u32),
    platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized target framework moniker '{0}'")]
pub struct FrameworkParseError(pub String);

impl TargetFramework {
    pub fn new(family: FrameworkFamily, major: u32, minor: u32) -> Self {
        Self {
            family,
            version: (major, minor, 0),
            platform: None,
        }
    }

    pub fn family(&self) -> FrameworkFamily {
        self.family
    }

    pub fn version(&self) -> (u32, u32, u32) {
        self.version
    }

    /// Platform suffix of an OS-specific moniker (`windows` for `net8.0-windows`).
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// True for frameworks that share the .NET Core runtime line.
    fn is_core_runtime(&self) -> bool {
        matches!(self.family, FrameworkFamily::Net | FrameworkFamily::NetCoreApp)
    }

    /// Whether an artifact targeting `self` can be loaded by a host running
    /// `active` on `runtime`.
    pub fn is_compatible_with(&self, active: &TargetFramework, runtime: &RuntimeIdentifier) -> bool {
        if let Some(platform) = &self.platform {
            if !platform_matches(platform, runtime) {
                return false;
            }
        }

        match active.family {
            FrameworkFamily::Net | FrameworkFamily::NetCoreApp => match self.family {
                FrameworkFamily::Net | FrameworkFamily::NetCoreApp => self.version <= active.version,
                FrameworkFamily::NetStandard => match self.version {
                    (1, _, _) | (2, 0, _) => active.version >= (2, 0, 0),
                    (2, 1, _) => active.version >= (3, 0, 0),
                    _ => false,
                },
                FrameworkFamily::NetFramework => false,
            },
            FrameworkFamily::NetFramework => match self.family {
                FrameworkFamily::NetFramework => self.version <= active.version,
                FrameworkFamily::NetStandard => {
                    self.version <= (2, 0, 0) && active.version >= (4, 6, 1)
                }
                _ => false,
            },
            FrameworkFamily::NetStandard => {
                self.family == FrameworkFamily::NetStandard && self.version <= active.version
            }
        }
    }

    /// Ordering key used to pick the "highest" compatible framework: runtime
    /// frameworks beat netstandard, then version, then OS-specific beats generic.
    fn precedence(&self) -> (u8, (u32, u32, u32), bool) {
        let rank = match self.family {
            FrameworkFamily::NetStandard => 0,
            _ => 1,
        };
        (rank, self.version, self.platform.is_some())
    }

    /// Picks the framework to use from `available`: an exact match with the
    /// active framework if present, otherwise the highest compatible one.
    pub fn select<'a>(
        available: &'a [TargetFramework],
        active: &TargetFramework,
        runtime: &RuntimeIdentifier,
    ) -> Option<&'a TargetFramework> {
        if let Some(exact) = available.iter().find(|tf| *tf == active) {
            return Some(exact);
        }
        available
            .iter()
            .filter(|tf| tf.is_compatible_with(active, runtime))
            .max_by_key(|tf| tf.precedence())
    }
}

fn platform_matches(platform: &str, runtime: &RuntimeIdentifier) -> bool {
    // Strip a trailing OS version (`windows10.0.19041` -> `windows`).
    let name: String = platform
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let os = match name.as_str() {
        "windows" => "win",
        "macos" => "osx",
        other => other,
    };
    runtime.os() == os
}

impl FromStr for TargetFramework {
    type Err = FrameworkParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = || FrameworkParseError(input.to_string());
        let lower = input.trim().to_ascii_lowercase();

        let (moniker, platform) = match lower.split_once('-') {
            Some((m, p)) if !p.is_empty() => (m.to_string(), Some(p.to_string())),
            Some(_) => return Err(fail()),
            None => (lower.clone(), None),
        };

        let dotted = |rest: &str| -> Option<(u32, u32, u32)> {
            let mut parts = rest.split('.').map(|p| p.parse::<u32>().ok());
            let major = parts.next()??;
            let minor = parts.next().unwrap_or(Some(0))?;
            let patch = parts.next().unwrap_or(Some(0))?;
            Some((major, minor, patch))
        };

        let (family, version) = if let Some(rest) = moniker.strip_prefix("netstandard") {
            (FrameworkFamily::NetStandard, dotted(rest).ok_or_else(fail)?)
        } else if let Some(rest) = moniker.strip_prefix("netcoreapp") {
            (FrameworkFamily::NetCoreApp, dotted(rest).ok_or_else(fail)?)
        } else if let Some(rest) = moniker.strip_prefix("net") {
            if rest.contains('.') {
                let version = dotted(rest).ok_or_else(fail)?;
                if version.0 < 5 {
                    return Err(fail());
                }
                (FrameworkFamily::Net, version)
            } else {
                // net48, net472: one digit per component.
                let digits: Vec<u32> = rest
                    .chars()
                    .map(|c| c.to_digit(10))
                    .collect::<Option<_>>()
                    .ok_or_else(fail)?;
                if digits.is_empty() || digits.len() > 3 {
                    return Err(fail());
                }
                let d = |i: usize| digits.get(i).copied().unwrap_or(0);
                (FrameworkFamily::NetFramework, (d(0), d(1), d(2)))
            }
        } else {
            return Err(fail());
        };

        if platform.is_some() && family != FrameworkFamily::Net {
            return Err(fail());
        }

        Ok(Self {
            family,
            version,
            platform,
        })
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor, patch) = self.version;
        match self.family {
            FrameworkFamily::Net => write!(f, "net{}.{}", major, minor)?,
            FrameworkFamily::NetCoreApp => write!(f, "netcoreapp{}.{}", major, minor)?,
            FrameworkFamily::NetStandard => write!(f, "netstandard{}.{}", major, minor)?,
            FrameworkFamily::NetFramework => {
                write!(f, "net{}{}", major, minor)?;
                if patch > 0 {
                    write!(f, "{}", patch)?;
                }
            }
        }
        if let Some(platform) = &self.platform {
            write!(f, "-{}", platform)?;
        }
        Ok(())
    }
}

impl Serialize for TargetFramework {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetFramework {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
