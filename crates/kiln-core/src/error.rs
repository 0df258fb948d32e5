//! Error types for Kiln.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a reference directive could not be turned into loadable artifacts.
///
/// Every variant names the offending identity (path, package, or project) so a
/// caller can render a precise message without inspecting session internals.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionError {
    /// No loadable binary exists at any candidate location.
    #[error("Assembly not found: '{reference}' (searched {} location(s))", .searched.len())]
    AssemblyNotFound {
        reference: String,
        searched: Vec<PathBuf>,
    },

    /// The registry has no package with this name (or no such version).
    #[error("Package not found: {name}{}", version_suffix(.version))]
    PackageNotFound {
        name: String,
        version: Option<String>,
    },

    /// The package exists but its files could not be obtained.
    #[error("Failed to download package {name}{}: {reason}", version_suffix(.version))]
    PackageDownloadFailed {
        name: String,
        version: Option<String>,
        reason: String,
    },

    /// The build tool exited with a failure or produced no output.
    #[error("Build failed for project {}: {}", .project.display(), describe_exit(.exit_code))]
    ProjectBuildFailed {
        project: PathBuf,
        exit_code: Option<i32>,
        output: String,
    },

    /// A project produced more than one candidate primary output.
    #[error("Project {} has no unique build output ({} candidates)", .project.display(), .candidates.len())]
    AmbiguousProjectSelection {
        project: PathBuf,
        candidates: Vec<PathBuf>,
    },

    /// Project references form a cycle; the path lists the cycle in walk order.
    #[error("Cyclic project reference: {}", format_cycle(.cycle))]
    CyclicProjectReference { cycle: Vec<PathBuf> },

    /// A different file with the same identity is already referenced. Only
    /// reported as a warning; the file already loaded stays.
    #[error("Ignored {}: '{identity}' is already loaded from {}", .ignored.display(), .kept.display())]
    ShadowedArtifact {
        identity: String,
        kept: PathBuf,
        ignored: PathBuf,
    },

    /// None of the project's target frameworks can run on the active framework.
    #[error("Project {} targets [{}], none compatible with {active}", .project.display(), .available.join(", "))]
    NoCompatibleFramework {
        project: PathBuf,
        available: Vec<String>,
        active: String,
    },
}

fn version_suffix(version: &Option<String>) -> String {
    version
        .as_ref()
        .map(|v| format!(" {}", v))
        .unwrap_or_default()
}

fn describe_exit(code: &Option<i32>) -> String {
    match *code {
        Some(0) => "no output produced".to_string(),
        Some(code) => format!("exit code {}", code),
        None => "build tool did not run".to_string(),
    }
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl ResolutionError {
    /// Short machine-readable kind name, e.g. `"AssemblyNotFound"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssemblyNotFound { .. } => "AssemblyNotFound",
            Self::PackageNotFound { .. } => "PackageNotFound",
            Self::PackageDownloadFailed { .. } => "PackageDownloadFailed",
            Self::ProjectBuildFailed { .. } => "ProjectBuildFailed",
            Self::AmbiguousProjectSelection { .. } => "AmbiguousProjectSelection",
            Self::CyclicProjectReference { .. } => "CyclicProjectReference",
            Self::NoCompatibleFramework { .. } => "NoCompatibleFramework",
            Self::ShadowedArtifact { .. } => "ShadowedArtifact",
        }
    }
}

/// A shared error type for the whole Kiln workspace.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum KilnError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", "XML"
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A reference directive could not be resolved
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The caller's cancellation signal fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KilnError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Serialization error
    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the resolution failure, if this is one.
    pub fn as_resolution(&self) -> Option<&ResolutionError> {
        match self {
            Self::Resolution(err) => Some(err),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for KilnError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for KilnError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization("TOML", err.to_string())
    }
}

impl From<toml::ser::Error> for KilnError {
    fn from(err: toml::ser::Error) -> Self {
        Self::serialization("TOML", err.to_string())
    }
}

/// Conversion from anyhow::Error, used at adapter boundaries
impl From<anyhow::Error> for KilnError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

/// A type alias for `Result<T, KilnError>`.
pub type Result<T> = std::result::Result<T, KilnError>;
