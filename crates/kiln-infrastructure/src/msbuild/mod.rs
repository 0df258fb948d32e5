//! MSBuild project and solution files.
//!
//! Only the static shape of a project is read: target frameworks, assembly
//! name, project references and package references. MSBuild conditions,
//! imports and property expansion are not evaluated.

mod project;
mod solution;

pub use project::parse_project;
pub use solution::parse_solution;

use async_trait::async_trait;
use kiln_core::collaborator::{ProjectDescriptor, ProjectReader, SolutionDescriptor};
use kiln_core::{KilnError, Result};
use std::path::Path;

/// [`ProjectReader`] over project files on the local disk.
#[derive(Debug, Clone, Default)]
pub struct MsBuildProjectReader;

impl MsBuildProjectReader {
    pub fn new() -> Self {
        Self
    }
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            KilnError::not_found("Project file", path.display().to_string())
        } else {
            KilnError::io(format!("Failed to read {}: {}", path.display(), err))
        }
    })
}

#[async_trait]
impl ProjectReader for MsBuildProjectReader {
    async fn read_project(&self, path: &Path) -> Result<ProjectDescriptor> {
        let content = read_file(path).await?;
        let descriptor = parse_project(path, &content)
            .map_err(|err| KilnError::serialization("XML", format!("{:#}", err)))?;
        tracing::debug!(
            "[MsBuildProjectReader] {} -> {} ({} framework(s), {} project ref(s), {} package ref(s))",
            path.display(),
            descriptor.assembly_name,
            descriptor.target_frameworks.len(),
            descriptor.project_references.len(),
            descriptor.package_references.len()
        );
        Ok(descriptor)
    }

    async fn read_solution(&self, path: &Path) -> Result<SolutionDescriptor> {
        let content = read_file(path).await?;
        let descriptor = parse_solution(path, &content)
            .map_err(|err| KilnError::serialization("XML", format!("{:#}", err)))?;
        tracing::debug!(
            "[MsBuildProjectReader] {} lists {} project(s)",
            path.display(),
            descriptor.projects.len()
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_project_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Tool.csproj");
        std::fs::write(
            &path,
            r#"<Project Sdk="Microsoft.NET.Sdk"><PropertyGroup><TargetFramework>net8.0</TargetFramework></PropertyGroup></Project>"#,
        )
        .unwrap();

        let descriptor = MsBuildProjectReader::new().read_project(&path).await.unwrap();
        assert_eq!(descriptor.assembly_name, "Tool");
        assert_eq!(descriptor.path, path);
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let err = MsBuildProjectReader::new()
            .read_project(&PathBuf::from("/nonexistent/Nope.csproj"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn malformed_solution_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Broken.slnx");
        std::fs::write(&path, "<Solution><Project Path=\"a.csproj\"></Solution>").unwrap();

        let err = MsBuildProjectReader::new().read_solution(&path).await.unwrap_err();
        assert!(matches!(err, KilnError::Serialization { .. }));
    }
}
