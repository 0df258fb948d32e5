//! Runtime identifiers (`win-x64`, `linux-arm64`, `osx`, `any`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const KNOWN_ARCHITECTURES: &[&str] = &["x64", "x86", "arm64", "arm", "s390x", "ppc64le", "loongarch64"];

/// Operating system plus optional architecture, used to pick
/// platform-specific runtime assets out of a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeIdentifier {
    os: String,
    arch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid runtime identifier '{0}'")]
pub struct RuntimeParseError(pub String);

impl RuntimeIdentifier {
    /// The architecture-neutral, OS-neutral identifier.
    pub fn any() -> Self {
        Self {
            os: "any".to_string(),
            arch: None,
        }
    }

    /// Identifier of the machine this process runs on.
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "windows" => "win",
            "macos" => "osx",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => Some("x64"),
            "aarch64" => Some("arm64"),
            "x86" => Some("x86"),
            "arm" => Some("arm"),
            _ => None,
        };
        Self {
            os: os.to_string(),
            arch: arch.map(str::to_string),
        }
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> Option<&str> {
        self.arch.as_deref()
    }

    pub fn is_any(&self) -> bool {
        self.os == "any"
    }

    /// Identifiers an asset may be tagged with to be usable on this runtime,
    /// most specific first: `win-x64`, `win`, `any`.
    pub fn fallback_chain(&self) -> Vec<RuntimeIdentifier> {
        let mut chain = vec![self.clone()];
        if self.arch.is_some() {
            chain.push(Self {
                os: self.os.clone(),
                arch: None,
            });
        }
        if !self.is_any() {
            chain.push(Self::any());
        }
        chain
    }

    /// Position of `asset` in this runtime's fallback chain; lower is more
    /// specific. `None` means the asset cannot be used here.
    pub fn specificity(&self, asset: &RuntimeIdentifier) -> Option<usize> {
        self.fallback_chain().iter().position(|rid| rid == asset)
    }
}

impl Default for RuntimeIdentifier {
    fn default() -> Self {
        Self::host()
    }
}

impl FromStr for RuntimeIdentifier {
    type Err = RuntimeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let lower = input.trim().to_ascii_lowercase();
        if lower.is_empty() || lower.starts_with('-') || lower.ends_with('-') {
            return Err(RuntimeParseError(input.to_string()));
        }
        match lower.rsplit_once('-') {
            Some((os, arch)) if KNOWN_ARCHITECTURES.contains(&arch) => Ok(Self {
                os: os.to_string(),
                arch: Some(arch.to_string()),
            }),
            _ => Ok(Self {
                os: lower,
                arch: None,
            }),
        }
    }
}

impl fmt::Display for RuntimeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arch {
            Some(arch) => write!(f, "{}-{}", self.os, arch),
            None => write!(f, "{}", self.os),
        }
    }
}

impl Serialize for RuntimeIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RuntimeIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_os_and_arch() {
        let rid: RuntimeIdentifier = "win-x64".parse().unwrap();
        assert_eq!(rid.os(), "win");
        assert_eq!(rid.arch(), Some("x64"));

        let rid: RuntimeIdentifier = "linux-musl-arm64".parse().unwrap();
        assert_eq!(rid.os(), "linux-musl");
        assert_eq!(rid.arch(), Some("arm64"));

        let rid: RuntimeIdentifier = "osx".parse().unwrap();
        assert_eq!(rid.arch(), None);
    }

    #[test]
    fn fallback_chain_goes_from_specific_to_any() {
        let rid: RuntimeIdentifier = "win-x64".parse().unwrap();
        let chain: Vec<String> = rid.fallback_chain().iter().map(|r| r.to_string()).collect();
        assert_eq!(chain, vec!["win-x64", "win", "any"]);
    }

    #[test]
    fn specificity_ranks_assets() {
        let rid: RuntimeIdentifier = "win-x64".parse().unwrap();
        assert_eq!(rid.specificity(&"win-x64".parse().unwrap()), Some(0));
        assert_eq!(rid.specificity(&"win".parse().unwrap()), Some(1));
        assert_eq!(rid.specificity(&RuntimeIdentifier::any()), Some(2));
        assert_eq!(rid.specificity(&"linux-x64".parse().unwrap()), None);
    }

    #[test]
    fn rejects_malformed() {
        assert!("".parse::<RuntimeIdentifier>().is_err());
        assert!("win-".parse::<RuntimeIdentifier>().is_err());
    }
}
