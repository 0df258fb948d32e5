//! Reference resolution: turning directives into loadable artifacts.
//!
//! # Module Structure
//!
//! - `assembly`: bare assembly paths against working directory and search paths
//! - `package`: registry packages, their transitive closure and asset selection
//! - `project_graph`: projects and solutions, built through the build tool

mod assembly;
mod package;
mod project_graph;

pub use assembly::resolve_assembly;
pub use package::PackageResolver;
pub use project_graph::ProjectGraphResolver;

use kiln_core::artifact::Resolution;
use kiln_core::collaborator::{BuildTool, PackageRegistry, ProjectReader};
use kiln_core::config::SessionConfig;
use kiln_core::directive::ReferenceDirective;
use kiln_core::framework::TargetFramework;
use kiln_core::runtime::RuntimeIdentifier;
use kiln_core::{KilnError, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where and for what platform references are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchContext {
    pub working_directory: PathBuf,
    pub search_paths: Vec<PathBuf>,
    pub target_framework: TargetFramework,
    pub runtime: RuntimeIdentifier,
}

impl SearchContext {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            working_directory: config.working_directory.clone(),
            search_paths: config.search_paths.clone(),
            target_framework: config.target_framework.clone(),
            runtime: config.runtime_identifier.clone(),
        }
    }

    /// `path` if absolute, otherwise joined onto the working directory.
    pub fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_directory.join(path)
        }
    }
}

/// Races `future` against the caller's cancellation signal.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(KilnError::Cancelled),
        result = future => result,
    }
}

/// Resolves one reference directive into artifacts without touching session
/// state. Safe to call repeatedly for the same directive: package fetches are
/// memoized and project builds are skipped when outputs are up to date.
pub struct ReferenceArtifactResolver {
    packages: Arc<PackageResolver>,
    projects: ProjectGraphResolver,
}

impl ReferenceArtifactResolver {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        project_reader: Arc<dyn ProjectReader>,
        build_tool: Arc<dyn BuildTool>,
    ) -> Self {
        let packages = Arc::new(PackageResolver::new(registry));
        let projects = ProjectGraphResolver::new(project_reader, build_tool, packages.clone());
        Self { packages, projects }
    }

    pub fn packages(&self) -> &PackageResolver {
        &self.packages
    }

    pub async fn resolve(
        &self,
        directive: &ReferenceDirective,
        context: &SearchContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        tracing::debug!("[ReferenceArtifactResolver] Resolving {}", directive);

        if cancel.is_cancelled() {
            return Err(KilnError::Cancelled);
        }

        match directive {
            ReferenceDirective::AssemblyPath(path) => resolve_assembly(path, context).await,
            ReferenceDirective::Package { name, version } => {
                self.packages
                    .resolve(name, version.as_ref(), context, cancel)
                    .await
            }
            ReferenceDirective::ProjectFile(path) => {
                self.projects.resolve_project(path, context, cancel).await
            }
            ReferenceDirective::SolutionFile(path) => {
                self.projects.resolve_solution(path, context, cancel).await
            }
        }
    }
}
