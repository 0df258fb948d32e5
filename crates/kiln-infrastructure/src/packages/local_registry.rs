use super::nuspec::Nuspec;
use async_trait::async_trait;
use kiln_core::collaborator::{
    FetchedPackage, PackageAsset, PackageDependency, PackageManifest, PackageRegistry,
};
use kiln_core::config::SessionConfig;
use kiln_core::framework::TargetFramework;
use kiln_core::runtime::RuntimeIdentifier;
use kiln_core::version::PackageVersion;
use kiln_core::{KilnError, ResolutionError, Result};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// [`PackageRegistry`] over an extracted package folder laid out as
/// `<root>/<id-lowercase>/<version>/`, the layout of the global packages
/// folder.
///
/// Nothing is downloaded: a package that is not on disk is reported as not
/// found.
#[derive(Debug, Clone)]
pub struct LocalPackageRegistry {
    root: PathBuf,
    target_framework: TargetFramework,
    runtime: RuntimeIdentifier,
}

impl LocalPackageRegistry {
    pub fn new(
        root: impl Into<PathBuf>,
        target_framework: TargetFramework,
        runtime: RuntimeIdentifier,
    ) -> Self {
        Self {
            root: root.into(),
            target_framework,
            runtime,
        }
    }

    /// Registry over the session's package root, or the default one.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let root = match &config.package_root {
            Some(root) => root.clone(),
            None => crate::paths::KilnPaths::default_package_root()?,
        };
        Ok(Self::new(
            root,
            config.target_framework.clone(),
            config.runtime_identifier.clone(),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Installed versions of `name` with their folders, ascending.
    async fn installed(&self, name: &str) -> Result<Vec<(PackageVersion, PathBuf)>> {
        let dir = self.root.join(name.to_ascii_lowercase());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(download_failed(name, None, err.to_string())),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let version = entry
                .file_name()
                .to_str()
                .and_then(|v| v.parse::<PackageVersion>().ok());
            if let Some(version) = version {
                versions.push((version, entry.path()));
            }
        }
        versions.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(versions)
    }

    async fn load_manifest(
        &self,
        name: &str,
        version: &PackageVersion,
        dir: &Path,
    ) -> Result<PackageManifest> {
        let nuspec_path = find_nuspec(dir)
            .await
            .ok_or_else(|| download_failed(name, Some(version), "no .nuspec in package folder"))?;
        let content = tokio::fs::read_to_string(&nuspec_path)
            .await
            .map_err(|err| download_failed(name, Some(version), err.to_string()))?;
        let nuspec = Nuspec::parse(&content)
            .map_err(|err| download_failed(name, Some(version), format!("{:#}", err)))?;

        let mut assets = lib_assets(&dir.join("lib"), None).await;
        let mut runtimes = match tokio::fs::read_dir(dir.join("runtimes")).await {
            Ok(entries) => entries,
            Err(_) => {
                return Ok(self.manifest(nuspec, assets));
            }
        };
        while let Ok(Some(entry)) = runtimes.next_entry().await {
            let rid = entry
                .file_name()
                .to_str()
                .and_then(|r| r.parse::<RuntimeIdentifier>().ok());
            let Some(rid) = rid else {
                continue;
            };
            assets.extend(lib_assets(&entry.path().join("lib"), Some(rid)).await);
        }
        Ok(self.manifest(nuspec, assets))
    }

    fn manifest(&self, nuspec: Nuspec, assets: Vec<PackageAsset>) -> PackageManifest {
        PackageManifest {
            dependencies: nuspec.dependencies_for(&self.target_framework, &self.runtime),
            name: nuspec.id,
            version: nuspec.version,
            assets,
        }
    }

    /// Lowest installed version satisfying `dependency`.
    async fn pick_dependency(
        &self,
        dependency: &PackageDependency,
    ) -> Result<(PackageVersion, PathBuf)> {
        let installed = self.installed(&dependency.name).await?;
        let chosen = match &dependency.min_version {
            Some(min) => installed.into_iter().find(|(v, _)| v >= min),
            None => installed.into_iter().next(),
        };
        chosen.ok_or_else(|| {
            ResolutionError::PackageNotFound {
                name: dependency.name.clone(),
                version: dependency.min_version.as_ref().map(|v| format!(">= {}", v)),
            }
            .into()
        })
    }
}

#[async_trait]
impl PackageRegistry for LocalPackageRegistry {
    async fn fetch(&self, name: &str, version: Option<&PackageVersion>) -> Result<FetchedPackage> {
        let installed = self.installed(name).await?;
        let chosen = match version {
            Some(requested) => installed.iter().find(|(v, _)| v == requested),
            None => installed
                .iter()
                .rev()
                .find(|(v, _)| !v.is_prerelease())
                .or_else(|| installed.last()),
        };
        let Some((chosen, dir)) = chosen else {
            return Err(ResolutionError::PackageNotFound {
                name: name.to_string(),
                version: version.map(|v| v.to_string()),
            }
            .into());
        };

        tracing::debug!(
            "[LocalPackageRegistry] Loading {} {} from {}",
            name,
            chosen,
            self.root.display()
        );
        let root = self.load_manifest(name, chosen, dir).await?;

        let mut seen: HashSet<(String, PackageVersion)> = HashSet::new();
        seen.insert((root.name.to_ascii_lowercase(), root.version.clone()));
        let mut queue: VecDeque<PackageDependency> = root.dependencies.iter().cloned().collect();
        let mut transitive = Vec::new();

        while let Some(dependency) = queue.pop_front() {
            let (version, dir) = self.pick_dependency(&dependency).await?;
            if !seen.insert((dependency.name.to_ascii_lowercase(), version.clone())) {
                continue;
            }
            let manifest = self.load_manifest(&dependency.name, &version, &dir).await?;
            queue.extend(manifest.dependencies.iter().cloned());
            transitive.push(manifest);
        }

        tracing::info!(
            "[LocalPackageRegistry] {} {} with {} transitive package(s)",
            root.name,
            root.version,
            transitive.len()
        );
        Ok(FetchedPackage { root, transitive })
    }
}

fn download_failed(
    name: &str,
    version: Option<&PackageVersion>,
    reason: impl Into<String>,
) -> KilnError {
    ResolutionError::PackageDownloadFailed {
        name: name.to_string(),
        version: version.map(|v| v.to_string()),
        reason: reason.into(),
    }
    .into()
}

async fn find_nuspec(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("nuspec")) {
            return Some(path);
        }
    }
    None
}

/// `<lib>/<tfm>/*.dll`, skipping folders that are not framework monikers.
async fn lib_assets(lib: &Path, runtime: Option<RuntimeIdentifier>) -> Vec<PackageAsset> {
    let mut assets = Vec::new();
    let Ok(mut frameworks) = tokio::fs::read_dir(lib).await else {
        return assets;
    };
    while let Ok(Some(framework_dir)) = frameworks.next_entry().await {
        let Some(framework) = framework_dir
            .file_name()
            .to_str()
            .and_then(|f| f.parse::<TargetFramework>().ok())
        else {
            continue;
        };
        let Ok(mut files) = tokio::fs::read_dir(framework_dir.path()).await else {
            continue;
        };
        let mut found = Vec::new();
        while let Ok(Some(file)) = files.next_entry().await {
            let path = file.path();
            if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("dll")) {
                found.push(path);
            }
        }
        found.sort();
        assets.extend(found.into_iter().map(|path| PackageAsset {
            path,
            framework: framework.clone(),
            runtime: runtime.clone(),
        }));
    }
    assets.sort_by(|a, b| a.path.cmp(&b.path));
    assets
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_package(root: &Path, id: &str, version: &str, deps: &[(&str, &str)], tfms: &[&str]) {
        let dir = root.join(id.to_ascii_lowercase()).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        let dependencies: String = deps
            .iter()
            .map(|(dep, range)| format!(r#"<dependency id="{}" version="{}" />"#, dep, range))
            .collect();
        std::fs::write(
            dir.join(format!("{}.nuspec", id.to_ascii_lowercase())),
            format!(
                r#"<package><metadata><id>{}</id><version>{}</version><dependencies><group targetFramework=".NETStandard2.0">{}</group></dependencies></metadata></package>"#,
                id, version, dependencies
            ),
        )
        .unwrap();
        for tfm in tfms {
            let lib = dir.join("lib").join(tfm);
            std::fs::create_dir_all(&lib).unwrap();
            std::fs::write(lib.join(format!("{}.dll", id)), b"MZ").unwrap();
        }
    }

    fn registry(root: &Path) -> LocalPackageRegistry {
        LocalPackageRegistry::new(root, "net8.0".parse().unwrap(), "linux-x64".parse().unwrap())
    }

    #[tokio::test]
    async fn latest_stable_version_is_the_default() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "Humanizer", "2.11.10", &[], &["netstandard2.0"]);
        write_package(dir.path(), "Humanizer", "2.14.1", &[], &["netstandard2.0"]);
        write_package(dir.path(), "Humanizer", "3.0.0-beta.1", &[], &["netstandard2.0"]);

        let fetched = registry(dir.path()).fetch("humanizer", None).await.unwrap();
        assert_eq!(fetched.root.name, "Humanizer");
        assert_eq!(fetched.root.version.to_string(), "2.14.1");
        assert_eq!(fetched.root.assets.len(), 1);
        assert_eq!(fetched.root.assets[0].framework.to_string(), "netstandard2.0");
    }

    #[tokio::test]
    async fn dependencies_resolve_to_lowest_applicable_version() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "App.Core", "1.0.0", &[("Shared", "2.0.0")], &["net6.0"]);
        write_package(dir.path(), "Shared", "1.0.0", &[], &["netstandard2.0"]);
        write_package(dir.path(), "Shared", "2.1.0", &[("Leaf", "[1.0,)")], &["netstandard2.0"]);
        write_package(dir.path(), "Shared", "3.0.0", &[], &["netstandard2.0"]);
        write_package(dir.path(), "Leaf", "1.2.0", &[], &["netstandard2.0"]);

        let version: PackageVersion = "1.0.0".parse().unwrap();
        let fetched = registry(dir.path()).fetch("App.Core", Some(&version)).await.unwrap();

        let transitive: Vec<_> = fetched
            .transitive
            .iter()
            .map(|m| format!("{} {}", m.name, m.version))
            .collect();
        assert_eq!(transitive, vec!["Shared 2.1.0", "Leaf 1.2.0"]);
    }

    #[tokio::test]
    async fn runtime_specific_assets_are_listed() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "Native.Wrapper", "1.0.0", &[], &["net6.0"]);
        let rid_lib = dir
            .path()
            .join("native.wrapper/1.0.0/runtimes/linux-x64/lib/net6.0");
        std::fs::create_dir_all(&rid_lib).unwrap();
        std::fs::write(rid_lib.join("Native.Wrapper.dll"), b"MZ").unwrap();

        let fetched = registry(dir.path()).fetch("Native.Wrapper", None).await.unwrap();
        let runtimes: Vec<_> = fetched
            .root
            .assets
            .iter()
            .map(|a| a.runtime.as_ref().map(|r| r.to_string()))
            .collect();
        assert_eq!(runtimes, vec![None, Some("linux-x64".to_string())]);
    }

    #[tokio::test]
    async fn unknown_package_or_version_is_not_found() {
        let dir = TempDir::new().unwrap();
        write_package(dir.path(), "Present", "1.0.0", &[], &["net6.0"]);
        let registry = registry(dir.path());

        let err = registry.fetch("Absent", None).await.unwrap_err();
        assert_eq!(err.as_resolution().map(|e| e.kind()), Some("PackageNotFound"));

        let version: PackageVersion = "9.9.9".parse().unwrap();
        let err = registry.fetch("Present", Some(&version)).await.unwrap_err();
        assert!(matches!(
            err.as_resolution(),
            Some(ResolutionError::PackageNotFound { version: Some(v), .. }) if v == "9.9.9"
        ));
    }

    #[tokio::test]
    async fn unreadable_nuspec_is_a_download_failure() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("broken/1.0.0");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("broken.nuspec"), "<package><metadata>").unwrap();

        let err = registry(dir.path()).fetch("Broken", None).await.unwrap_err();
        assert_eq!(err.as_resolution().map(|e| e.kind()), Some("PackageDownloadFailed"));
    }
}
