//! [`BuildTool`] backed by the `dotnet` CLI.

use async_trait::async_trait;
use kiln_core::collaborator::{BuildOutput, BuildTool, ProjectDescriptor};
use kiln_core::framework::TargetFramework;
use kiln_core::{KilnError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Directories that hold build products rather than sources.
const OUTPUT_DIRS: &[&str] = &["bin", "obj"];

/// Runs `dotnet build` for a project and reports its primary output.
#[derive(Debug, Clone)]
pub struct DotnetBuildTool {
    program: PathBuf,
    configuration: String,
}

impl DotnetBuildTool {
    pub fn new(configuration: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from("dotnet"),
            configuration: configuration.into(),
        }
    }

    /// Uses a specific `dotnet` executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    /// Where the SDK places the primary output for `framework`.
    pub fn output_path(&self, project: &ProjectDescriptor, framework: &TargetFramework) -> PathBuf {
        project_dir(project)
            .join("bin")
            .join(&self.configuration)
            .join(framework.to_string())
            .join(format!("{}.dll", project.assembly_name))
    }
}

fn project_dir(project: &ProjectDescriptor) -> &Path {
    project.path.parent().unwrap_or_else(|| Path::new("."))
}

#[async_trait]
impl BuildTool for DotnetBuildTool {
    async fn build(
        &self,
        project: &ProjectDescriptor,
        framework: &TargetFramework,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput> {
        let framework_arg = framework.to_string();
        tracing::info!(
            "[DotnetBuildTool] Building {} for {} ({})",
            project.path.display(),
            framework_arg,
            self.configuration
        );

        let child = Command::new(&self.program)
            .arg("build")
            .arg(&project.path)
            .args(["-f", &framework_arg, "-c", &self.configuration, "--nologo"])
            .current_dir(project_dir(project))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                KilnError::io(format!("Failed to start {}: {}", self.program.display(), err))
            })?;

        // Dropping the wait future kills the child.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("[DotnetBuildTool] Build of {} cancelled", project.path.display());
                return Err(KilnError::Cancelled);
            }
            output = child.wait_with_output() => output?,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        let primary = self.output_path(project, framework);
        let artifacts = if exit_code == 0 && tokio::fs::try_exists(&primary).await.unwrap_or(false) {
            vec![primary]
        } else {
            Vec::new()
        };

        if exit_code != 0 {
            tracing::warn!(
                "[DotnetBuildTool] Build of {} exited with {}",
                project.path.display(),
                exit_code
            );
        }

        Ok(BuildOutput {
            exit_code,
            artifacts,
            log,
        })
    }

    async fn existing_output(
        &self,
        project: &ProjectDescriptor,
        framework: &TargetFramework,
    ) -> Option<Vec<PathBuf>> {
        let primary = self.output_path(project, framework);
        let built_at = modified(&primary).await?;
        let newest_input = newest_source(project_dir(project)).await?;
        if built_at >= newest_input {
            tracing::debug!(
                "[DotnetBuildTool] {} is up to date",
                primary.display()
            );
            Some(vec![primary])
        } else {
            None
        }
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Newest modification time of any file under `root`, skipping build
/// output directories. `None` if the tree cannot be read.
async fn newest_source(root: &Path) -> Option<SystemTime> {
    let mut newest = SystemTime::UNIX_EPOCH;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.ok()?;
        while let Some(entry) = entries.next_entry().await.ok()? {
            let file_type = entry.file_type().await.ok()?;
            if file_type.is_dir() {
                let name = entry.file_name();
                let skip = name
                    .to_str()
                    .is_some_and(|n| n.starts_with('.') || OUTPUT_DIRS.contains(&n));
                if !skip {
                    pending.push(entry.path());
                }
            } else if let Some(time) = entry.metadata().await.ok().and_then(|m| m.modified().ok()) {
                newest = newest.max(time);
            }
        }
    }
    Some(newest)
}
