use crate::error::ResolutionError;
use crate::framework::TargetFramework;
use crate::runtime::RuntimeIdentifier;
use crate::version::PackageVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Name plus optional version of a loadable unit.
///
/// Two artifacts with the same [`key`](Self::key) are the same logical
/// assembly; the reference set keeps only one of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    pub name: String,
    pub version: Option<PackageVersion>,
}

impl ArtifactIdentity {
    pub fn new(name: impl Into<String>, version: Option<PackageVersion>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Identity of a bare file: the file stem, no version.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Self::new(name, None)
    }

    /// Case-insensitive lookup key.
    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Where an artifact came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSource {
    /// A `#r "path.dll"` reference.
    Assembly,
    /// An asset of a package.
    Package {
        name: String,
        version: PackageVersion,
    },
    /// The build output of a project.
    Project { path: PathBuf },
}

/// A concrete, loadable compiled unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub identity: ArtifactIdentity,
    pub location: PathBuf,
    pub display: String,
    pub framework: Option<TargetFramework>,
    /// Runtime the asset is specific to; `None` for portable assets.
    pub runtime: Option<RuntimeIdentifier>,
    /// Identities of the artifacts this one pulled into the session.
    pub pulled_in: Vec<ArtifactIdentity>,
    pub source: ArtifactSource,
}

impl ResolvedArtifact {
    /// A plain assembly referenced by path.
    pub fn assembly(location: PathBuf) -> Self {
        let identity = ArtifactIdentity::from_path(&location);
        Self {
            display: location.display().to_string(),
            identity,
            location,
            framework: None,
            runtime: None,
            pulled_in: Vec::new(),
            source: ArtifactSource::Assembly,
        }
    }

    pub fn key(&self) -> String {
        self.identity.key()
    }

    /// Name of the package this artifact belongs to, if any.
    pub fn package_name(&self) -> Option<&str> {
        match &self.source {
            ArtifactSource::Package { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn package_version(&self) -> Option<&PackageVersion> {
        match &self.source {
            ArtifactSource::Package { version, .. } => Some(version),
            _ => None,
        }
    }
}

/// Output of resolving one directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub artifacts: Vec<ResolvedArtifact>,
    /// Failures that did not abort the directive.
    pub warnings: Vec<ResolutionError>,
    /// Human-readable summary such as `"Humanizer 2.14.1 (3 assemblies)"`.
    pub summary: String,
}

impl Resolution {
    pub fn new(artifacts: Vec<ResolvedArtifact>, summary: impl Into<String>) -> Self {
        Self {
            artifacts,
            warnings: Vec::new(),
            summary: summary.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
