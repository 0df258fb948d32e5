//! Scripted collaborators for end-to-end session tests.
//!
//! `ScriptedFrontend` understands a tiny statement language that is just
//! enough to drive a session: integer and string literals, `var` declarations,
//! variable reads, `.Length`, `throw new ...`, `new Type()` for types from
//! loaded artifacts, `chars("...")` spans, `stackonly Name` values, and
//! `hold` / `spin` / `abort` statements for concurrency and cancellation.

#![allow(dead_code)]

use async_trait::async_trait;
use kiln_core::artifact::ReferenceSet;
use kiln_core::collaborator::{
    BuildOutput, BuildTool, CompileOutcome, CompileRequest, CompilerFrontend, EnvironmentHandle,
    FetchedPackage, PackageAsset, PackageDependency, PackageManifest, PackageRegistry,
    ProjectDescriptor, ProjectReader, SolutionDescriptor,
};
use kiln_core::completion::{SymbolCandidate, SymbolKind};
use kiln_core::config::{BusyPolicy, SessionConfig};
use kiln_core::evaluation::{Diagnostic, FaultDescription};
use kiln_core::framework::TargetFramework;
use kiln_core::value::{ContiguousView, RawValue, StackOnlyValue};
use kiln_core::version::PackageVersion;
use kiln_core::{KilnError, ResolutionError, Result};
use kiln_execution::{Collaborators, Evaluator};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct ScriptEnv {
    pub variables: BTreeMap<String, (String, Value)>,
    /// Artifact names visible to the last successful compilation.
    pub loaded: Vec<String>,
}

#[derive(Default)]
pub struct ScriptedFrontend {
    pub compiled: Mutex<Vec<String>>,
    pub released: Mutex<Vec<u64>>,
    /// Signalled when a `hold` statement starts waiting.
    pub holding: Notify,
    /// Wakes a waiting `hold` statement.
    pub resume: Notify,
}

enum Step {
    Value(Option<RawValue>),
    Fault(FaultDescription),
    Error(Diagnostic),
}

impl ScriptedFrontend {
    async fn run_statement(
        &self,
        statement: &str,
        env: &mut ScriptEnv,
        references: &ReferenceSet,
        cancel: &CancellationToken,
    ) -> Result<Step> {
        if statement == "hold" {
            self.holding.notify_one();
            self.resume.notified().await;
            return Ok(Step::Value(None));
        }
        if statement == "abort" {
            // The host gives up while the script is throwing.
            cancel.cancel();
            return Ok(Step::Fault(FaultDescription::new(
                "System.OperationCanceledException",
                "The operation was canceled.",
            )));
        }
        if statement == "spin" {
            cancel.cancelled().await;
            return Err(KilnError::Cancelled);
        }
        if let Some(rest) = statement.strip_prefix("throw new ") {
            let type_name = rest.trim_end_matches("()").to_string();
            return Ok(Step::Fault(FaultDescription::new(
                type_name,
                "Exception of type 'System.Exception' was thrown.",
            )));
        }
        if let Some(rest) = statement.strip_prefix("var ") {
            let Some((name, expr)) = rest.split_once('=') else {
                return Ok(Step::Error(Diagnostic::error("Syntax error").with_code("CS1002")));
            };
            return match literal(expr.trim()).or_else(|| read_variable(env, expr.trim())) {
                Some(binding) => {
                    env.variables.insert(name.trim().to_string(), binding);
                    Ok(Step::Value(None))
                }
                None => Ok(Step::Error(unknown_name(expr.trim()))),
            };
        }
        if let Some(rest) = statement.strip_prefix("new ") {
            let type_name = rest.trim_end_matches("()");
            let visible = references.iter().any(|artifact| {
                let prefix = format!("{}.", artifact.identity.name);
                type_name.starts_with(&prefix)
            });
            if !visible {
                return Ok(Step::Error(
                    Diagnostic::error(format!(
                        "The type or namespace name '{}' could not be found",
                        type_name
                    ))
                    .with_code("CS0246")
                    .at(1, 5),
                ));
            }
            return Ok(Step::Value(Some(RawValue::boxed(type_name, json!({})))));
        }
        if let Some(rest) = statement.strip_prefix("chars(") {
            let text = rest.trim_end_matches(')').trim_matches('"').to_string();
            return Ok(Step::Value(Some(RawValue::view(
                "System.ReadOnlySpan<char>",
                CharView(text),
            ))));
        }
        if let Some(rest) = statement.strip_prefix("stackonly ") {
            return Ok(Step::Value(Some(RawValue::stack_only(rest.trim(), NoOverride))));
        }
        if let Some(name) = statement.strip_suffix(".Length") {
            return match env.variables.get(name) {
                Some((_, Value::String(s))) => Ok(Step::Value(Some(RawValue::boxed(
                    "System.Int32",
                    json!(s.chars().count()),
                )))),
                _ => Ok(Step::Error(unknown_name(name))),
            };
        }
        match literal(statement).or_else(|| read_variable(env, statement)) {
            Some((type_name, value)) => Ok(Step::Value(Some(RawValue::boxed(type_name, value)))),
            None => Ok(Step::Error(unknown_name(statement))),
        }
    }
}

fn literal(expr: &str) -> Option<(String, Value)> {
    if let Ok(n) = expr.parse::<i64>() {
        return Some(("System.Int32".to_string(), json!(n)));
    }
    let inner = expr.strip_prefix('"')?.strip_suffix('"')?;
    Some(("System.String".to_string(), json!(inner)))
}

fn read_variable(env: &ScriptEnv, name: &str) -> Option<(String, Value)> {
    env.variables.get(name).cloned()
}

fn unknown_name(name: &str) -> Diagnostic {
    Diagnostic::error(format!("The name '{}' does not exist in the current context", name))
        .with_code("CS0103")
        .at(1, 1)
}

struct CharView(String);

impl ContiguousView for CharView {
    fn len(&self) -> std::result::Result<usize, FaultDescription> {
        Ok(self.0.chars().count())
    }

    fn char_preview(&self) -> Option<std::result::Result<String, FaultDescription>> {
        Some(Ok(self.0.clone()))
    }
}

struct NoOverride;

impl StackOnlyValue for NoOverride {
    fn custom_text(&self) -> Option<std::result::Result<String, FaultDescription>> {
        None
    }
}

#[async_trait]
impl CompilerFrontend for ScriptedFrontend {
    fn initial_environment(&self) -> EnvironmentHandle {
        EnvironmentHandle::new(ScriptEnv::default())
    }

    async fn compile_and_run(
        &self,
        request: CompileRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CompileOutcome> {
        self.compiled.lock().unwrap().push(request.source.to_string());
        let mut env = request
            .environment
            .downcast_ref::<ScriptEnv>()
            .cloned()
            .unwrap_or_default();

        let statements: Vec<&str> = request
            .source
            .split([';', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let mut last = None;
        for statement in statements {
            match self
                .run_statement(statement, &mut env, request.references, cancel)
                .await?
            {
                Step::Value(value) => last = value,
                Step::Fault(fault) => {
                    return Ok(CompileOutcome::Faulted {
                        fault,
                        environment: request.environment.successor(env),
                    });
                }
                Step::Error(diagnostic) => {
                    return Ok(CompileOutcome::Diagnostics(vec![diagnostic]));
                }
            }
        }

        env.loaded = request
            .references
            .iter()
            .map(|a| a.identity.name.clone())
            .collect();
        Ok(CompileOutcome::Completed {
            value: last,
            environment: request.environment.successor(env),
        })
    }

    async fn enumerate_symbols(
        &self,
        environment: &EnvironmentHandle,
        _text: &str,
        _cursor: usize,
    ) -> Result<Vec<SymbolCandidate>> {
        let env = environment
            .downcast_ref::<ScriptEnv>()
            .ok_or_else(|| KilnError::internal("foreign environment"))?;
        let mut symbols: Vec<SymbolCandidate> = env
            .variables
            .keys()
            .map(|name| SymbolCandidate::new(name.clone(), SymbolKind::Local))
            .collect();
        symbols.extend(
            env.loaded
                .iter()
                .map(|name| SymbolCandidate::new(name.clone(), SymbolKind::Namespace)),
        );
        symbols.push(SymbolCandidate::new("var", SymbolKind::Keyword));
        Ok(symbols)
    }

    async fn release(&self, environment: EnvironmentHandle) {
        self.released.lock().unwrap().push(environment.generation());
    }
}

/// Registry over an in-memory package list that counts fetches.
#[derive(Default)]
pub struct CountingRegistry {
    pub packages: Vec<FetchedPackage>,
    pub fetches: Mutex<Vec<(String, Option<String>)>>,
}

impl CountingRegistry {
    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl PackageRegistry for CountingRegistry {
    async fn fetch(&self, name: &str, version: Option<&PackageVersion>) -> Result<FetchedPackage> {
        self.fetches
            .lock()
            .unwrap()
            .push((name.to_string(), version.map(|v| v.to_string())));
        self.packages
            .iter()
            .filter(|p| p.root.name.eq_ignore_ascii_case(name))
            .filter(|p| version.is_none_or(|v| p.root.version == *v))
            .max_by(|a, b| a.root.version.cmp(&b.root.version))
            .cloned()
            .ok_or_else(|| {
                ResolutionError::PackageNotFound {
                    name: name.to_string(),
                    version: version.map(|v| v.to_string()),
                }
                .into()
            })
    }
}

pub fn manifest(name: &str, version: &str, deps: &[&str]) -> PackageManifest {
    PackageManifest {
        name: name.to_string(),
        version: version.parse().unwrap(),
        dependencies: deps
            .iter()
            .map(|d| PackageDependency {
                name: d.to_string(),
                min_version: None,
            })
            .collect(),
        assets: vec![PackageAsset {
            path: PathBuf::from(format!(
                "/packages/{}/{}/lib/net6.0/{}.dll",
                name.to_lowercase(),
                version,
                name
            )),
            framework: "net6.0".parse().unwrap(),
            runtime: None,
        }],
    }
}

pub fn package(root: PackageManifest, transitive: Vec<PackageManifest>) -> FetchedPackage {
    FetchedPackage { root, transitive }
}

/// Project reader and build tool over in-memory descriptors.
#[derive(Default)]
pub struct FixtureProjects {
    pub projects: HashMap<PathBuf, ProjectDescriptor>,
    pub solutions: HashMap<PathBuf, SolutionDescriptor>,
    pub builds: Mutex<Vec<String>>,
}

impl FixtureProjects {
    pub fn add_project(&mut self, path: &str, tfms: &[&str]) {
        let path = PathBuf::from(path);
        let assembly_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        self.projects.insert(
            path.clone(),
            ProjectDescriptor {
                path,
                assembly_name,
                target_frameworks: tfms.iter().map(|t| t.parse().unwrap()).collect(),
                project_references: Vec::new(),
                package_references: Vec::new(),
            },
        );
    }

    pub fn add_solution(&mut self, path: &str, projects: &[&str]) {
        self.solutions.insert(
            PathBuf::from(path),
            SolutionDescriptor {
                path: PathBuf::from(path),
                projects: projects.iter().map(PathBuf::from).collect(),
            },
        );
    }
}

#[async_trait]
impl ProjectReader for FixtureProjects {
    async fn read_project(&self, path: &Path) -> Result<ProjectDescriptor> {
        self.projects
            .get(path)
            .cloned()
            .ok_or_else(|| KilnError::not_found("Project", path.display().to_string()))
    }

    async fn read_solution(&self, path: &Path) -> Result<SolutionDescriptor> {
        self.solutions
            .get(path)
            .cloned()
            .ok_or_else(|| KilnError::not_found("Solution", path.display().to_string()))
    }
}

#[async_trait]
impl BuildTool for FixtureProjects {
    async fn build(
        &self,
        project: &ProjectDescriptor,
        framework: &TargetFramework,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutput> {
        self.builds.lock().unwrap().push(project.assembly_name.clone());
        Ok(BuildOutput {
            exit_code: 0,
            artifacts: vec![project.path.with_file_name(format!(
                "bin/Debug/{}/{}.dll",
                framework, project.assembly_name
            ))],
            log: String::new(),
        })
    }
}

pub struct Harness {
    pub evaluator: Arc<Evaluator>,
    pub frontend: Arc<ScriptedFrontend>,
    pub registry: Arc<CountingRegistry>,
    pub projects: Arc<FixtureProjects>,
}

pub fn config(working_directory: &Path, busy_policy: BusyPolicy) -> SessionConfig {
    SessionConfig {
        working_directory: working_directory.to_path_buf(),
        target_framework: "net8.0".parse().unwrap(),
        runtime_identifier: "linux-x64".parse().unwrap(),
        busy_policy,
        ..SessionConfig::default()
    }
}

pub fn harness_with(
    config: SessionConfig,
    packages: Vec<FetchedPackage>,
    projects: FixtureProjects,
) -> Harness {
    let frontend = Arc::new(ScriptedFrontend::default());
    let registry = Arc::new(CountingRegistry {
        packages,
        ..Default::default()
    });
    let projects = Arc::new(projects);
    let evaluator = Arc::new(Evaluator::new(
        config,
        Collaborators {
            frontend: frontend.clone(),
            registry: registry.clone(),
            project_reader: projects.clone(),
            build_tool: projects.clone(),
        },
    ));
    Harness {
        evaluator,
        frontend,
        registry,
        projects,
    }
}

pub fn harness() -> Harness {
    harness_with(
        config(Path::new("/work"), BusyPolicy::Reject),
        Vec::new(),
        FixtureProjects::default(),
    )
}
