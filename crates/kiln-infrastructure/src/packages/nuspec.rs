use crate::xml::{attribute, local_name, text};
use anyhow::{Context, Result, anyhow};
use kiln_core::collaborator::PackageDependency;
use kiln_core::framework::TargetFramework;
use kiln_core::runtime::RuntimeIdentifier;
use kiln_core::version::PackageVersion;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Dependencies declared for one target framework, or for all of them when
/// `framework` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    pub framework: Option<TargetFramework>,
    pub dependencies: Vec<PackageDependency>,
}

/// The parts of a `.nuspec` the registry needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nuspec {
    pub id: String,
    pub version: PackageVersion,
    pub groups: Vec<DependencyGroup>,
}

impl Nuspec {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut id = None;
        let mut version = None;
        let mut groups: Vec<DependencyGroup> = Vec::new();
        let mut in_group = false;

        loop {
            let (element, is_empty) = match reader.read_event()? {
                Event::Start(element) => (element, false),
                Event::Empty(element) => (element, true),
                Event::Text(content) => {
                    match stack.as_slice() {
                        [.., parent, current] if parent == "metadata" && current == "id" => {
                            id = Some(text(&content))
                        }
                        [.., parent, current] if parent == "metadata" && current == "version" => {
                            version = Some(text(&content))
                        }
                        _ => {}
                    }
                    continue;
                }
                Event::End(_) => {
                    if stack.pop().as_deref() == Some("group") {
                        in_group = false;
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let name = local_name(&element);
            match name.as_str() {
                "group" => {
                    let framework = attribute(&element, "targetFramework")
                        .and_then(|raw| framework_from_nuspec(&raw));
                    groups.push(DependencyGroup {
                        framework,
                        dependencies: Vec::new(),
                    });
                    in_group = !is_empty;
                }
                "dependency" => {
                    let dependency_id = attribute(&element, "id")
                        .ok_or_else(|| anyhow!("<dependency> without an id"))?;
                    let dependency = PackageDependency {
                        name: dependency_id,
                        min_version: attribute(&element, "version")
                            .and_then(|range| minimum_version(&range)),
                    };
                    if !in_group && groups.last().is_none_or(|g| g.framework.is_some()) {
                        groups.push(DependencyGroup {
                            framework: None,
                            dependencies: Vec::new(),
                        });
                    }
                    if let Some(group) = groups.last_mut() {
                        group.dependencies.push(dependency);
                    }
                }
                _ => {}
            }
            if !is_empty {
                stack.push(name);
            }
        }

        let id = id.ok_or_else(|| anyhow!("missing <id>"))?;
        let raw_version = version.ok_or_else(|| anyhow!("missing <version>"))?;
        let version = raw_version
            .parse()
            .with_context(|| format!("bad version in {} nuspec", id))?;
        Ok(Self {
            id,
            version,
            groups,
        })
    }

    /// Dependencies that apply when running on `active`: the best matching
    /// framework group, else the framework-neutral group.
    pub fn dependencies_for(
        &self,
        active: &TargetFramework,
        runtime: &RuntimeIdentifier,
    ) -> Vec<PackageDependency> {
        let frameworks: Vec<TargetFramework> = self
            .groups
            .iter()
            .filter_map(|g| g.framework.clone())
            .collect();
        let chosen = TargetFramework::select(&frameworks, active, runtime);

        self.groups
            .iter()
            .find(|g| match chosen {
                Some(tf) => g.framework.as_ref() == Some(tf),
                None => g.framework.is_none(),
            })
            .map(|g| g.dependencies.clone())
            .unwrap_or_default()
    }
}

/// Normalizes the long framework names nuspec files use
/// (`.NETStandard2.0`, `.NETFramework4.7.2`) to short monikers.
pub fn framework_from_nuspec(raw: &str) -> Option<TargetFramework> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let short = if let Some(rest) = lower.strip_prefix(".netstandard") {
        format!("netstandard{}", rest)
    } else if let Some(rest) = lower.strip_prefix(".netcoreapp") {
        format!("netcoreapp{}", rest)
    } else if let Some(rest) = lower.strip_prefix(".netframework") {
        format!("net{}", rest.replace('.', ""))
    } else {
        lower
    };
    match short.parse() {
        Ok(tf) => Some(tf),
        Err(err) => {
            tracing::debug!("[LocalPackageRegistry] Ignoring dependency group: {}", err);
            None
        }
    }
}

/// Lower bound of a NuGet version range: `1.2` and `[1.2, 2.0)` both give
/// `1.2`; `(, 2.0]` has none.
pub fn minimum_version(range: &str) -> Option<PackageVersion> {
    let inner = range
        .trim()
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')']);
    let lower = inner.split(',').next()?.trim();
    if lower.is_empty() {
        return None;
    }
    lower.parse().ok()
}
