use crate::xml::{attribute, local_name, text};
use anyhow::{Context, Result};
use kiln_core::collaborator::{PackageReference, ProjectDescriptor};
use kiln_core::framework::TargetFramework;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::path::{Component, Path, PathBuf};

/// Values pulled out of a project file before they are interpreted.
#[derive(Debug, Default)]
struct RawProject {
    target_framework: Option<String>,
    target_frameworks: Option<String>,
    assembly_name: Option<String>,
    project_references: Vec<String>,
    package_references: Vec<(String, Option<String>)>,
}

/// Parses an SDK-style project file located at `path`.
///
/// Later `PropertyGroup` values override earlier ones; conditions are not
/// evaluated.
pub fn parse_project(path: &Path, xml: &str) -> Result<ProjectDescriptor> {
    let raw = read_raw(xml).with_context(|| format!("Failed to parse {}", path.display()))?;
    let project_dir = path.parent().unwrap_or_else(|| Path::new(""));

    let framework_list = raw
        .target_frameworks
        .or(raw.target_framework)
        .unwrap_or_default();
    let target_frameworks = framework_list
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|moniker| match moniker.parse::<TargetFramework>() {
            Ok(tf) => Some(tf),
            Err(err) => {
                tracing::warn!("[MsBuildProjectReader] {}: skipping {}", path.display(), err);
                None
            }
        })
        .collect();

    let assembly_name = raw.assembly_name.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string()
    });

    let project_references = raw
        .project_references
        .iter()
        .map(|include| normalize(&project_dir.join(msbuild_path(include))))
        .collect();

    let package_references = raw
        .package_references
        .into_iter()
        .map(|(name, version)| PackageReference {
            version: version.and_then(|v| match v.parse() {
                Ok(version) => Some(version),
                Err(_) => {
                    tracing::debug!(
                        "[MsBuildProjectReader] {} version '{}' is not exact, using latest",
                        name,
                        v
                    );
                    None
                }
            }),
            name,
        })
        .collect();

    Ok(ProjectDescriptor {
        path: path.to_path_buf(),
        assembly_name,
        target_frameworks,
        project_references,
        package_references,
    })
}

fn read_raw(xml: &str) -> Result<RawProject> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut raw = RawProject::default();
    let mut stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = local_name(&element);
                on_element(&element, &name, &mut raw);
                stack.push(name);
            }
            Event::Empty(element) => {
                let name = local_name(&element);
                on_element(&element, &name, &mut raw);
            }
            Event::Text(content) => {
                let value = text(&content);
                on_text(&stack, value, &mut raw);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(raw)
}

fn on_element(element: &BytesStart<'_>, name: &str, raw: &mut RawProject) {
    match name {
        "ProjectReference" => {
            if let Some(include) = attribute(element, "Include") {
                raw.project_references.push(include);
            }
        }
        "PackageReference" => {
            if let Some(include) = attribute(element, "Include") {
                raw.package_references
                    .push((include, attribute(element, "Version")));
            }
        }
        _ => {}
    }
}

fn on_text(stack: &[String], value: String, raw: &mut RawProject) {
    let [.., parent, current] = stack else {
        return;
    };
    match (parent.as_str(), current.as_str()) {
        ("PropertyGroup", "TargetFramework") => raw.target_framework = Some(value),
        ("PropertyGroup", "TargetFrameworks") => raw.target_frameworks = Some(value),
        ("PropertyGroup", "AssemblyName") => raw.assembly_name = Some(value),
        ("PackageReference", "Version") => {
            if let Some(last) = raw.package_references.last_mut() {
                last.1 = Some(value);
            }
        }
        _ => {}
    }
}

/// MSBuild paths use backslashes regardless of platform.
pub(crate) fn msbuild_path(include: &str) -> PathBuf {
    PathBuf::from(include.replace('\\', "/"))
}

pub(crate) fn normalize(path: &Path) -> PathBuf {
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
