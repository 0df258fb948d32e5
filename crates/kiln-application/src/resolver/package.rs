use super::{SearchContext, cancellable};
use kiln_core::artifact::{
    ArtifactIdentity, ArtifactSource, ReferenceSet, Resolution, ResolvedArtifact,
};
use kiln_core::collaborator::{FetchedPackage, PackageAsset, PackageManifest, PackageRegistry};
use kiln_core::framework::TargetFramework;
use kiln_core::version::PackageVersion;
use kiln_core::{KilnError, ResolutionError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

type FetchKey = (String, String);

/// Resolves registry packages into assemblies for the active framework and
/// runtime.
///
/// Each `(name, version)` identity is fetched at most once for the lifetime
/// of the resolver; concurrent requests for the same identity wait on the
/// same lock instead of fetching twice.
pub struct PackageResolver {
    registry: Arc<dyn PackageRegistry>,
    fetched: Mutex<HashMap<FetchKey, FetchedPackage>>,
}

impl PackageResolver {
    pub fn new(registry: Arc<dyn PackageRegistry>) -> Self {
        Self {
            registry,
            fetched: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct package identities fetched so far.
    pub async fn fetched_count(&self) -> usize {
        self.fetched.lock().await.len()
    }

    pub async fn resolve(
        &self,
        name: &str,
        version: Option<&PackageVersion>,
        context: &SearchContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let package = cancellable(cancel, self.fetch(name, version)).await?;
        let (artifacts, warnings) = select_artifacts(&package, context);

        let dependency_count = count_distinct_dependencies(&package);
        let summary = format!(
            "{} {} (+{} dependencies, {} assemblies)",
            package.root.name,
            package.root.version,
            dependency_count,
            artifacts.len()
        );
        tracing::info!("[PackageResolver] {}", summary);

        let mut resolution = Resolution::new(artifacts, summary);
        resolution.warnings = warnings;
        Ok(resolution)
    }

    async fn fetch(&self, name: &str, version: Option<&PackageVersion>) -> Result<FetchedPackage> {
        let key = fetch_key(name, version);
        let mut fetched = self.fetched.lock().await;
        if let Some(package) = fetched.get(&key) {
            tracing::debug!("[PackageResolver] Reusing fetched {} {}", key.0, key.1);
            return Ok(package.clone());
        }

        tracing::debug!("[PackageResolver] Fetching {} {}", name, key.1);
        let package = self
            .registry
            .fetch(name, version)
            .await
            .map_err(|err| download_failure(name, version, err))?;
        fetched.insert(key, package.clone());
        Ok(package)
    }
}

fn fetch_key(name: &str, version: Option<&PackageVersion>) -> FetchKey {
    (
        name.to_ascii_lowercase(),
        version.map_or_else(|| "latest".to_string(), |v| v.to_string()),
    )
}

fn download_failure(name: &str, version: Option<&PackageVersion>, err: KilnError) -> KilnError {
    match err {
        KilnError::Resolution(_) | KilnError::Cancelled => err,
        other => ResolutionError::PackageDownloadFailed {
            name: name.to_string(),
            version: version.map(|v| v.to_string()),
            reason: other.to_string(),
        }
        .into(),
    }
}

fn count_distinct_dependencies(package: &FetchedPackage) -> usize {
    let root = package.root.name.to_ascii_lowercase();
    let mut names: Vec<String> = package
        .transitive
        .iter()
        .map(|m| m.name.to_ascii_lowercase())
        .filter(|n| *n != root)
        .collect();
    names.sort();
    names.dedup();
    names.len()
}

/// Chooses the assemblies to load from a fetched package closure.
///
/// When two manifests in the closure name the same package, the higher
/// version wins. Within a manifest, generic and runtime-specific assets each
/// get their best framework; host-specific assets then replace generic ones
/// of the same name. Manifests are merged in package-name order, so when two
/// packages ship the same assembly the alphabetically first one is kept and
/// the other is returned as a warning.
fn select_artifacts(
    package: &FetchedPackage,
    context: &SearchContext,
) -> (Vec<ResolvedArtifact>, Vec<ResolutionError>) {
    let mut winners: BTreeMap<String, &PackageManifest> = BTreeMap::new();
    for manifest in package.manifests() {
        winners
            .entry(manifest.name.to_ascii_lowercase())
            .and_modify(|current| {
                if manifest.version > current.version {
                    *current = manifest;
                }
            })
            .or_insert(manifest);
    }

    let root_key = package.root.name.to_ascii_lowercase();
    let mut dependency_identities: Vec<ArtifactIdentity> = winners
        .iter()
        .filter(|(key, _)| **key != root_key)
        .map(|(_, m)| ArtifactIdentity::new(m.name.clone(), Some(m.version.clone())))
        .collect();
    dependency_identities.sort_by_key(|identity| identity.key());

    let mut set = ReferenceSet::new();
    let mut warnings = Vec::new();
    for (key, manifest) in &winners {
        let pulled_in = if *key == root_key {
            dependency_identities.clone()
        } else {
            Vec::new()
        };
        let artifacts = manifest_artifacts(manifest, context)
            .into_iter()
            .map(|mut artifact| {
                artifact.pulled_in = pulled_in.clone();
                artifact
            });
        warnings.extend(set.merge(artifacts, &context.runtime));
    }
    (set.to_vec(), warnings)
}

fn manifest_artifacts(manifest: &PackageManifest, context: &SearchContext) -> Vec<ResolvedArtifact> {
    let usable: Vec<&PackageAsset> = manifest
        .assets
        .iter()
        .filter(|asset| {
            asset
                .runtime
                .as_ref()
                .is_none_or(|rid| context.runtime.specificity(rid).is_some())
        })
        .collect();

    let (specific, generic): (Vec<&PackageAsset>, Vec<&PackageAsset>) =
        usable.into_iter().partition(|asset| asset.runtime.is_some());

    let mut chosen = best_framework_assets(&generic, context);
    chosen.extend(best_framework_assets(&specific, context));

    chosen
        .into_iter()
        .map(|asset| package_artifact(manifest, asset))
        .collect()
}

fn best_framework_assets<'a>(
    assets: &[&'a PackageAsset],
    context: &SearchContext,
) -> Vec<&'a PackageAsset> {
    let mut frameworks: Vec<TargetFramework> = assets.iter().map(|a| a.framework.clone()).collect();
    frameworks.dedup();
    let Some(best) =
        TargetFramework::select(&frameworks, &context.target_framework, &context.runtime)
    else {
        return Vec::new();
    };
    assets
        .iter()
        .copied()
        .filter(|asset| asset.framework == *best)
        .collect()
}

fn package_artifact(manifest: &PackageManifest, asset: &PackageAsset) -> ResolvedArtifact {
    let mut identity = ArtifactIdentity::from_path(&asset.path);
    identity.version = Some(manifest.version.clone());
    ResolvedArtifact {
        display: format!("{} ({} {})", identity.name, manifest.name, manifest.version),
        identity,
        location: asset.path.clone(),
        framework: Some(asset.framework.clone()),
        runtime: asset.runtime.clone(),
        pulled_in: Vec::new(),
        source: ArtifactSource::Package {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_core::collaborator::PackageDependency;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;

    struct MockRegistry {
        packages: Vec<FetchedPackage>,
        calls: StdMutex<Vec<String>>,
        fail_with: Option<KilnError>,
    }

    impl MockRegistry {
        fn new(packages: Vec<FetchedPackage>) -> Self {
            Self {
                packages,
                calls: StdMutex::new(Vec::new()),
                fail_with: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PackageRegistry for MockRegistry {
        async fn fetch(
            &self,
            name: &str,
            _version: Option<&PackageVersion>,
        ) -> Result<FetchedPackage> {
            self.calls.lock().unwrap().push(name.to_string());
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.packages
                .iter()
                .find(|p| p.root.name.eq_ignore_ascii_case(name))
                .cloned()
                .ok_or_else(|| {
                    ResolutionError::PackageNotFound {
                        name: name.to_string(),
                        version: None,
                    }
                    .into()
                })
        }
    }

    fn asset(path: &str, tfm: &str, rid: Option<&str>) -> PackageAsset {
        PackageAsset {
            path: PathBuf::from(path),
            framework: tfm.parse().unwrap(),
            runtime: rid.map(|r| r.parse().unwrap()),
        }
    }

    fn manifest(name: &str, version: &str, assets: Vec<PackageAsset>) -> PackageManifest {
        PackageManifest {
            name: name.to_string(),
            version: version.parse().unwrap(),
            dependencies: Vec::new(),
            assets,
        }
    }

    fn context() -> SearchContext {
        SearchContext {
            working_directory: PathBuf::from("/work"),
            search_paths: Vec::new(),
            target_framework: "net8.0".parse().unwrap(),
            runtime: "linux-x64".parse().unwrap(),
        }
    }

    fn humanizer() -> FetchedPackage {
        let mut root = manifest(
            "Humanizer",
            "2.14.1",
            vec![
                asset("/pkgs/humanizer/2.14.1/lib/netstandard2.0/Humanizer.dll", "netstandard2.0", None),
                asset("/pkgs/humanizer/2.14.1/lib/net6.0/Humanizer.dll", "net6.0", None),
            ],
        );
        root.dependencies.push(PackageDependency {
            name: "Humanizer.Core".to_string(),
            min_version: Some("2.14.1".parse().unwrap()),
        });
        FetchedPackage {
            root,
            transitive: vec![manifest(
                "Humanizer.Core",
                "2.14.1",
                vec![asset("/pkgs/humanizer.core/2.14.1/lib/net6.0/Humanizer.Core.dll", "net6.0", None)],
            )],
        }
    }

    #[tokio::test]
    async fn resolves_closure_with_highest_framework() {
        let registry = Arc::new(MockRegistry::new(vec![humanizer()]));
        let resolver = PackageResolver::new(registry);

        let resolution = resolver
            .resolve("Humanizer", None, &context(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolution.artifacts.len(), 2);
        let root = resolution
            .artifacts
            .iter()
            .find(|a| a.identity.name == "Humanizer")
            .unwrap();
        assert_eq!(root.framework.as_ref().unwrap().to_string(), "net6.0");
        assert_eq!(root.pulled_in.len(), 1);
        assert_eq!(root.pulled_in[0].name, "Humanizer.Core");
        assert_eq!(resolution.summary, "Humanizer 2.14.1 (+1 dependencies, 2 assemblies)");
    }

    #[tokio::test]
    async fn fetches_each_identity_once() {
        let registry = Arc::new(MockRegistry::new(vec![humanizer()]));
        let resolver = PackageResolver::new(registry.clone());
        let cancel = CancellationToken::new();
        let version: PackageVersion = "2.14.1".parse().unwrap();

        for _ in 0..3 {
            resolver
                .resolve("humanizer", Some(&version), &context(), &cancel)
                .await
                .unwrap();
        }
        assert_eq!(registry.call_count(), 1);
        assert_eq!(resolver.fetched_count().await, 1);
    }

    #[tokio::test]
    async fn transitive_conflict_keeps_higher_version() {
        let mut package = humanizer();
        package.transitive.push(manifest(
            "Humanizer.Core",
            "2.8.0",
            vec![asset("/pkgs/humanizer.core/2.8.0/lib/net6.0/Humanizer.Core.dll", "net6.0", None)],
        ));
        let resolver = PackageResolver::new(Arc::new(MockRegistry::new(vec![package])));

        let resolution = resolver
            .resolve("Humanizer", None, &context(), &CancellationToken::new())
            .await
            .unwrap();
        let core = resolution
            .artifacts
            .iter()
            .find(|a| a.identity.name == "Humanizer.Core")
            .unwrap();
        assert_eq!(core.identity.version, Some("2.14.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn host_runtime_asset_replaces_portable_one() {
        let package = FetchedPackage {
            root: manifest(
                "Native.Lib",
                "1.0.0",
                vec![
                    asset("/pkgs/native/lib/net8.0/Native.dll", "net8.0", None),
                    asset("/pkgs/native/runtimes/linux-x64/lib/net8.0/Native.dll", "net8.0", Some("linux-x64")),
                    asset("/pkgs/native/runtimes/win-x64/lib/net8.0/Native.dll", "net8.0", Some("win-x64")),
                ],
            ),
            transitive: Vec::new(),
        };
        let resolver = PackageResolver::new(Arc::new(MockRegistry::new(vec![package])));

        let resolution = resolver
            .resolve("Native.Lib", None, &context(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution.artifacts.len(), 1);
        assert!(resolution.artifacts[0].location.to_string_lossy().contains("linux-x64"));
    }

    #[tokio::test]
    async fn assembly_shipped_by_two_packages_is_picked_by_package_name() {
        let package = FetchedPackage {
            root: manifest(
                "Zeta",
                "1.0.0",
                vec![asset("/pkgs/zeta/1.0.0/lib/net8.0/Shared.dll", "net8.0", None)],
            ),
            transitive: vec![manifest(
                "Alpha",
                "1.0.0",
                vec![asset("/pkgs/alpha/1.0.0/lib/net8.0/Shared.dll", "net8.0", None)],
            )],
        };
        let resolver = PackageResolver::new(Arc::new(MockRegistry::new(vec![package])));
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            let resolution = resolver
                .resolve("Zeta", None, &context(), &cancel)
                .await
                .unwrap();
            assert_eq!(resolution.artifacts.len(), 1);
            assert_eq!(
                resolution.artifacts[0].location,
                PathBuf::from("/pkgs/alpha/1.0.0/lib/net8.0/Shared.dll")
            );
            assert!(matches!(
                resolution.warnings.as_slice(),
                [ResolutionError::ShadowedArtifact { ignored, .. }]
                    if ignored.starts_with("/pkgs/zeta")
            ));
        }
    }

    #[tokio::test]
    async fn registry_io_failure_becomes_download_failure() {
        let mut registry = MockRegistry::new(Vec::new());
        registry.fail_with = Some(KilnError::io("connection reset"));
        let resolver = PackageResolver::new(Arc::new(registry));

        let err = resolver
            .resolve("Anything", None, &context(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_resolution(),
            Some(ResolutionError::PackageDownloadFailed { name, .. }) if name == "Anything"
        ));
    }

    #[tokio::test]
    async fn unknown_package_is_not_found() {
        let resolver = PackageResolver::new(Arc::new(MockRegistry::new(Vec::new())));
        let err = resolver
            .resolve("Missing", None, &context(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.as_resolution(), Some(ResolutionError::PackageNotFound { .. })));
        assert_eq!(resolver.fetched_count().await, 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_fetch() {
        let registry = Arc::new(MockRegistry::new(vec![humanizer()]));
        let resolver = PackageResolver::new(registry.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver
            .resolve("Humanizer", None, &context(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(registry.call_count(), 0);
    }
}
