use super::{PackageResolver, SearchContext, cancellable};
use futures::future::{BoxFuture, FutureExt};
use kiln_core::artifact::{
    ArtifactIdentity, ArtifactSource, ReferenceSet, Resolution, ResolvedArtifact,
};
use kiln_core::collaborator::{BuildTool, ProjectDescriptor, ProjectReader};
use kiln_core::framework::TargetFramework;
use kiln_core::{KilnError, ResolutionError, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one project node: its own failure is not fatal to the walk.
type NodeOutcome = std::result::Result<ProjectNode, ResolutionError>;

#[derive(Debug, Clone)]
struct ProjectNode {
    artifact: ResolvedArtifact,
    /// The project's artifact plus everything it pulls in.
    closure: Vec<ResolvedArtifact>,
}

/// Resolves project and solution directives by walking project references
/// depth-first, building what is out of date and collecting package
/// references through the shared [`PackageResolver`].
pub struct ProjectGraphResolver {
    reader: Arc<dyn ProjectReader>,
    build_tool: Arc<dyn BuildTool>,
    packages: Arc<PackageResolver>,
}

impl ProjectGraphResolver {
    pub fn new(
        reader: Arc<dyn ProjectReader>,
        build_tool: Arc<dyn BuildTool>,
        packages: Arc<PackageResolver>,
    ) -> Self {
        Self {
            reader,
            build_tool,
            packages,
        }
    }

    pub async fn resolve_project(
        &self,
        path: &Path,
        context: &SearchContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let mut walk = GraphWalk::new(self, context, cancel);
        let node = walk.visit(path.to_path_buf()).await??;

        let mut set = ReferenceSet::new();
        let warnings = set.merge(node.closure, &context.runtime);
        let summary = format!(
            "Project {} ({}) with {} assemblies",
            node.artifact.identity.name,
            framework_label(&node.artifact),
            set.len()
        );
        tracing::info!("[ProjectGraphResolver] {}", summary);
        let mut resolution = Resolution::new(set.to_vec(), summary);
        resolution.warnings = warnings;
        Ok(resolution)
    }

    pub async fn resolve_solution(
        &self,
        path: &Path,
        context: &SearchContext,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let solution_path = context.absolutize(path);
        let solution = cancellable(cancel, self.reader.read_solution(&solution_path))
            .await
            .map_err(|err| as_build_failure(&solution_path, err))?;

        if solution.projects.is_empty() {
            return Err(ResolutionError::AmbiguousProjectSelection {
                project: solution_path,
                candidates: Vec::new(),
            }
            .into());
        }

        let mut walk = GraphWalk::new(self, context, cancel);
        let mut set = ReferenceSet::new();
        let mut warnings = Vec::new();
        let mut succeeded = 0usize;

        for project in &solution.projects {
            match walk.visit(project.clone()).await? {
                Ok(node) => {
                    succeeded += 1;
                    warnings.extend(set.merge(node.closure, &context.runtime));
                }
                Err(err) => {
                    tracing::warn!(
                        "[ProjectGraphResolver] Skipping {} in solution: {}",
                        project.display(),
                        err
                    );
                    warnings.push(err);
                }
            }
        }

        if succeeded == 0 && !warnings.is_empty() {
            return Err(warnings.swap_remove(0).into());
        }

        let summary = format!(
            "Solution {}: {} of {} projects, {} assemblies",
            display_name(&solution_path),
            succeeded,
            solution.projects.len(),
            set.len()
        );
        tracing::info!("[ProjectGraphResolver] {}", summary);

        let mut resolution = Resolution::new(set.to_vec(), summary);
        resolution.warnings = warnings;
        Ok(resolution)
    }
}

/// State of one depth-first walk. Finished projects are remembered so a
/// diamond-shaped graph builds each project once.
struct GraphWalk<'a> {
    resolver: &'a ProjectGraphResolver,
    context: &'a SearchContext,
    cancel: &'a CancellationToken,
    finished: HashMap<PathBuf, NodeOutcome>,
    in_progress: Vec<PathBuf>,
}

impl<'a> GraphWalk<'a> {
    fn new(
        resolver: &'a ProjectGraphResolver,
        context: &'a SearchContext,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            resolver,
            context,
            cancel,
            finished: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// The outer `Result` carries walk-aborting errors (cycles, cancellation);
    /// the inner one carries this project's own failure.
    fn visit(&mut self, path: PathBuf) -> BoxFuture<'_, Result<NodeOutcome>> {
        async move {
            let path = normalize(&self.context.absolutize(&path));

            if let Some(start) = self.in_progress.iter().position(|p| *p == path) {
                let mut cycle = self.in_progress[start..].to_vec();
                cycle.push(path);
                tracing::warn!("[ProjectGraphResolver] Cycle detected ({} projects)", cycle.len() - 1);
                return Err(ResolutionError::CyclicProjectReference { cycle }.into());
            }
            if let Some(done) = self.finished.get(&path) {
                return Ok(done.clone());
            }
            if self.cancel.is_cancelled() {
                return Err(KilnError::Cancelled);
            }

            self.in_progress.push(path.clone());
            let outcome = self.build_node(&path).await;
            self.in_progress.pop();

            let outcome = outcome?;
            self.finished.insert(path, outcome.clone());
            Ok(outcome)
        }
        .boxed()
    }

    async fn build_node(&mut self, path: &Path) -> Result<NodeOutcome> {
        let resolver = self.resolver;
        let descriptor = match cancellable(self.cancel, resolver.reader.read_project(path)).await {
            Ok(descriptor) => descriptor,
            Err(err) => return node_failure(as_build_failure(path, err)),
        };
        tracing::debug!(
            "[ProjectGraphResolver] Visiting {} ({} project refs, {} package refs)",
            descriptor.assembly_name,
            descriptor.project_references.len(),
            descriptor.package_references.len()
        );

        let Some(framework) = TargetFramework::select(
            &descriptor.target_frameworks,
            &self.context.target_framework,
            &self.context.runtime,
        )
        .cloned() else {
            return Ok(Err(ResolutionError::NoCompatibleFramework {
                project: path.to_path_buf(),
                available: descriptor
                    .target_frameworks
                    .iter()
                    .map(|tf| tf.to_string())
                    .collect(),
                active: self.context.target_framework.to_string(),
            }));
        };

        let mut closure = Vec::new();
        let mut pulled_in = Vec::new();
        for reference in &descriptor.project_references {
            match self.visit(reference.clone()).await? {
                Ok(node) => {
                    pulled_in.extend(node.closure.iter().map(|a| a.identity.clone()));
                    closure.extend(node.closure);
                }
                Err(err) => return Ok(Err(err)),
            }
        }

        for package in &descriptor.package_references {
            let resolution = resolver
                .packages
                .resolve(&package.name, package.version.as_ref(), self.context, self.cancel)
                .await;
            match resolution {
                Ok(resolution) => {
                    pulled_in.extend(resolution.artifacts.iter().map(|a| a.identity.clone()));
                    closure.extend(resolution.artifacts);
                }
                Err(err) => return node_failure(err),
            }
        }

        let output = match self.primary_output(&descriptor, &framework).await? {
            Ok(output) => output,
            Err(err) => return Ok(Err(err)),
        };

        pulled_in.sort_by_key(|identity| identity.key());
        pulled_in.dedup();
        let identity = ArtifactIdentity::from_path(&output);
        let artifact = ResolvedArtifact {
            display: format!("{} ({})", identity.name, display_name(path)),
            identity,
            location: output,
            framework: Some(framework),
            runtime: None,
            pulled_in,
            source: ArtifactSource::Project {
                path: path.to_path_buf(),
            },
        };
        closure.insert(0, artifact.clone());
        Ok(Ok(ProjectNode { artifact, closure }))
    }

    async fn primary_output(
        &self,
        descriptor: &ProjectDescriptor,
        framework: &TargetFramework,
    ) -> Result<std::result::Result<PathBuf, ResolutionError>> {
        let build_tool = &self.resolver.build_tool;
        let outputs = match build_tool.existing_output(descriptor, framework).await {
            Some(outputs) if !outputs.is_empty() => {
                tracing::debug!(
                    "[ProjectGraphResolver] {} is up to date",
                    descriptor.assembly_name
                );
                outputs
            }
            _ => {
                tracing::info!(
                    "[ProjectGraphResolver] Building {} for {}",
                    descriptor.assembly_name,
                    framework
                );
                let built =
                    cancellable(self.cancel, build_tool.build(descriptor, framework, self.cancel)).await;
                let build = match built {
                    Ok(build) => build,
                    Err(err) => return node_failure(as_build_failure(&descriptor.path, err)),
                };
                if !build.succeeded() {
                    return Ok(Err(ResolutionError::ProjectBuildFailed {
                        project: descriptor.path.clone(),
                        exit_code: Some(build.exit_code),
                        output: build.log,
                    }));
                }
                build.artifacts
            }
        };

        Ok(pick_primary(descriptor, outputs))
    }
}

fn pick_primary(
    descriptor: &ProjectDescriptor,
    mut outputs: Vec<PathBuf>,
) -> std::result::Result<PathBuf, ResolutionError> {
    if outputs.len() == 1 {
        return Ok(outputs.remove(0));
    }
    let matching: Vec<&PathBuf> = outputs
        .iter()
        .filter(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.eq_ignore_ascii_case(&descriptor.assembly_name))
        })
        .collect();
    match matching.as_slice() {
        [only] => Ok((*only).clone()),
        _ => Err(ResolutionError::AmbiguousProjectSelection {
            project: descriptor.path.clone(),
            candidates: outputs,
        }),
    }
}

/// Splits an error into a node failure (inner) or a walk-aborting one (outer).
fn node_failure<T>(err: KilnError) -> Result<std::result::Result<T, ResolutionError>> {
    match err {
        KilnError::Resolution(resolution) => Ok(Err(resolution)),
        other => Err(other),
    }
}

fn as_build_failure(path: &Path, err: KilnError) -> KilnError {
    match err {
        KilnError::Resolution(_) | KilnError::Cancelled => err,
        other => ResolutionError::ProjectBuildFailed {
            project: path.to_path_buf(),
            exit_code: None,
            output: other.to_string(),
        }
        .into(),
    }
}

fn framework_label(artifact: &ResolvedArtifact) -> String {
    artifact
        .framework
        .as_ref()
        .map(|tf| tf.to_string())
        .unwrap_or_default()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Lexically removes `.` and `..` so the same project reached through
/// different relative paths is one graph node.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
