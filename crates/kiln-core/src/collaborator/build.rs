//! Build tool and project reader interfaces.

use crate::error::Result;
use crate::framework::TargetFramework;
use crate::version::PackageVersion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReference {
    pub name: String,
    pub version: Option<PackageVersion>,
}

/// What a project file declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub path: PathBuf,
    pub assembly_name: String,
    pub target_frameworks: Vec<TargetFramework>,
    /// Absolute paths of referenced projects.
    pub project_references: Vec<PathBuf>,
    pub package_references: Vec<PackageReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionDescriptor {
    pub path: PathBuf,
    /// Absolute paths of the contained projects, in solution order.
    pub projects: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub exit_code: i32,
    /// Primary output assemblies of the project.
    pub artifacts: Vec<PathBuf>,
    /// Captured build log, for error reports.
    pub log: String,
}

impl BuildOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.artifacts.is_empty()
    }
}

/// Reads project and solution files.
#[async_trait]
pub trait ProjectReader: Send + Sync {
    async fn read_project(&self, path: &Path) -> Result<ProjectDescriptor>;

    async fn read_solution(&self, path: &Path) -> Result<SolutionDescriptor>;
}

/// Compiles a project into assemblies on disk.
#[async_trait]
pub trait BuildTool: Send + Sync {
    async fn build(
        &self,
        project: &ProjectDescriptor,
        framework: &TargetFramework,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput>;

    /// Primary outputs of a previous build that are newer than the project
    /// file, or `None` when a build is needed.
    async fn existing_output(
        &self,
        _project: &ProjectDescriptor,
        _framework: &TargetFramework,
    ) -> Option<Vec<PathBuf>> {
        None
    }
}
