use crate::version::PackageVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const ASSEMBLY_EXTENSIONS: &[&str] = &["dll", "exe"];
const PROJECT_EXTENSIONS: &[&str] = &["csproj", "fsproj", "vbproj"];
const SOLUTION_EXTENSIONS: &[&str] = &["sln", "slnx"];
const PACKAGE_PREFIX: &str = "nuget:";

/// A dependency declared by a submission, parsed from the quoted text of a
/// `#r "..."` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceDirective {
    AssemblyPath(PathBuf),
    Package {
        name: String,
        version: Option<PackageVersion>,
    },
    ProjectFile(PathBuf),
    SolutionFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("Reference directive is empty")]
    EmptyReference,
    #[error("Package reference has no package name")]
    EmptyPackageName,
    #[error("Invalid version '{version}' for package {name}")]
    InvalidVersion { name: String, version: String },
}

impl DirectiveError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyReference => "KILN0001",
            Self::EmptyPackageName | Self::InvalidVersion { .. } => "KILN0002",
        }
    }
}

impl ReferenceDirective {
    /// Parses the text between the quotes of a `#r` line.
    ///
    /// `nuget: Name[, Version]` is a package; a path is classified by its
    /// extension. Paths with any other extension are treated as assemblies.
    pub fn parse(text: &str) -> Result<Self, DirectiveError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DirectiveError::EmptyReference);
        }

        if text
            .get(..PACKAGE_PREFIX.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(PACKAGE_PREFIX))
        {
            return Self::parse_package(&text[PACKAGE_PREFIX.len()..]);
        }

        let path = PathBuf::from(text);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        Ok(if PROJECT_EXTENSIONS.contains(&extension.as_str()) {
            Self::ProjectFile(path)
        } else if SOLUTION_EXTENSIONS.contains(&extension.as_str()) {
            Self::SolutionFile(path)
        } else {
            Self::AssemblyPath(path)
        })
    }

    fn parse_package(spec: &str) -> Result<Self, DirectiveError> {
        let (name, version) = match spec.split_once(',') {
            Some((name, version)) => (name.trim(), Some(version.trim())),
            None => (spec.trim(), None),
        };
        if name.is_empty() {
            return Err(DirectiveError::EmptyPackageName);
        }
        let version = match version.filter(|v| !v.is_empty()) {
            Some(raw) => Some(raw.parse::<PackageVersion>().map_err(|_| {
                DirectiveError::InvalidVersion {
                    name: name.to_string(),
                    version: raw.to_string(),
                }
            })?),
            None => None,
        };
        Ok(Self::Package {
            name: name.to_string(),
            version,
        })
    }

    /// Whether the assembly path carries one of the known binary extensions.
    pub fn has_binary_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| ASSEMBLY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Short label used in logs and result summaries.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::AssemblyPath(_) => "assembly",
            Self::Package { .. } => "package",
            Self::ProjectFile(_) => "project",
            Self::SolutionFile(_) => "solution",
        }
    }
}

impl fmt::Display for ReferenceDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssemblyPath(path) | Self::ProjectFile(path) | Self::SolutionFile(path) => {
                write!(f, "#r \"{}\"", path.display())
            }
            Self::Package {
                name,
                version: Some(version),
            } => write!(f, "#r \"nuget: {}, {}\"", name, version),
            Self::Package {
                name,
                version: None,
            } => write!(f, "#r \"nuget: {}\"", name),
        }
    }
}
