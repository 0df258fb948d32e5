//! Package registry interface.

use crate::error::Result;
use crate::framework::TargetFramework;
use crate::runtime::RuntimeIdentifier;
use crate::version::PackageVersion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub name: String,
    /// Lowest acceptable version; `None` accepts any.
    pub min_version: Option<PackageVersion>,
}

/// One downloaded file of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAsset {
    pub path: PathBuf,
    pub framework: TargetFramework,
    /// Set for assets under `runtimes/<rid>/`.
    pub runtime: Option<RuntimeIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: PackageVersion,
    pub dependencies: Vec<PackageDependency>,
    pub assets: Vec<PackageAsset>,
}

/// A package together with the manifests of its transitive dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPackage {
    pub root: PackageManifest,
    pub transitive: Vec<PackageManifest>,
}

impl FetchedPackage {
    /// Root first, then dependencies.
    pub fn manifests(&self) -> impl Iterator<Item = &PackageManifest> {
        std::iter::once(&self.root).chain(self.transitive.iter())
    }
}

/// Fetches package manifests and files.
///
/// Implementations report a missing package with
/// [`ResolutionError::PackageNotFound`](crate::ResolutionError::PackageNotFound)
/// and transfer problems with
/// [`ResolutionError::PackageDownloadFailed`](crate::ResolutionError::PackageDownloadFailed),
/// wrapped in [`KilnError::Resolution`](crate::KilnError::Resolution).
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Fetches `name` at `version`, or the latest version when `None`.
    async fn fetch(&self, name: &str, version: Option<&PackageVersion>) -> Result<FetchedPackage>;
}
