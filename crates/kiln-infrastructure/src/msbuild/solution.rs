use super::project::{msbuild_path, normalize};
use crate::xml::{attribute, local_name};
use anyhow::{Context, Result};
use kiln_core::collaborator::SolutionDescriptor;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::path::Path;

const PROJECT_EXTENSIONS: &[&str] = &["csproj", "fsproj", "vbproj"];

static PROJECT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*Project\("\{[0-9A-Fa-f-]+\}"\)\s*=\s*"[^"]*"\s*,\s*"([^"]+)""#)
        .expect("valid solution regex")
});

/// Parses a classic `.sln` or an XML `.slnx` solution at `path`.
///
/// Solution folders and non-project entries are skipped; project paths are
/// resolved against the solution's directory.
pub fn parse_solution(path: &Path, content: &str) -> Result<SolutionDescriptor> {
    let entries = if has_extension(path, "slnx") {
        slnx_entries(content).with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        sln_entries(content)
    };

    let solution_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let projects = entries
        .iter()
        .map(|entry| msbuild_path(entry))
        .filter(|relative| {
            PROJECT_EXTENSIONS
                .iter()
                .any(|ext| has_extension(relative, ext))
        })
        .map(|relative| normalize(&solution_dir.join(relative)))
        .collect();

    Ok(SolutionDescriptor {
        path: path.to_path_buf(),
        projects,
    })
}

fn sln_entries(content: &str) -> Vec<String> {
    PROJECT_LINE
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn slnx_entries(content: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) => {
                if local_name(&element) == "Project" {
                    if let Some(path) = attribute(&element, "Path") {
                        entries.push(path);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(entries)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
