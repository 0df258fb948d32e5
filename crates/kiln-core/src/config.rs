use crate::framework::{FrameworkFamily, TargetFramework};
use crate::runtime::RuntimeIdentifier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do when a submission arrives while another is being evaluated.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Return `SessionBusy` immediately.
    #[default]
    Reject,
    /// Wait for the running evaluation to finish.
    Queue,
}

/// Per-session options.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Base directory for relative reference paths.
    pub working_directory: PathBuf,
    /// Directories tried, in order, after the working directory.
    pub search_paths: Vec<PathBuf>,
    /// Framework the session executes on.
    pub target_framework: TargetFramework,
    /// OS/architecture used to pick platform-specific assets.
    pub runtime_identifier: RuntimeIdentifier,
    pub busy_policy: BusyPolicy,
    /// Build configuration passed to the build tool (`Debug`, `Release`).
    pub build_configuration: String,
    /// Root of the local package folder; `None` uses the platform default.
    pub package_root: Option<PathBuf>,
    /// Longest character preview kept for span-like values.
    pub preview_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            search_paths: Vec::new(),
            target_framework: TargetFramework::new(FrameworkFamily::Net, 8, 0),
            runtime_identifier: RuntimeIdentifier::host(),
            busy_policy: BusyPolicy::default(),
            build_configuration: "Debug".to_string(),
            package_root: None,
            preview_limit: 1024,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RootConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
