//! Well-known locations used by Kiln.
//!
//! ```text
//! ~/.config/kiln/              # Config directory
//! └── config.toml              # Session and logging configuration
//!
//! ~/.nuget/packages/           # Default package root (NuGet global packages)
//! └── <id-lower>/<version>/    # One folder per installed package version
//! ```

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for kiln_core::KilnError {
    fn from(err: PathError) -> Self {
        kiln_core::KilnError::config(err.to_string())
    }
}

/// Environment variable that overrides the package root, as `dotnet` does.
pub const PACKAGES_ENV: &str = "NUGET_PACKAGES";

pub struct KilnPaths;

impl KilnPaths {
    /// Platform config directory for Kiln (e.g. `~/.config/kiln/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("kiln"))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Package root used when the configuration names none: `$NUGET_PACKAGES`
    /// if set, else `~/.nuget/packages`.
    pub fn default_package_root() -> Result<PathBuf, PathError> {
        if let Some(root) = std::env::var_os(PACKAGES_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(root));
        }
        dirs::home_dir()
            .map(|home| home.join(".nuget").join("packages"))
            .ok_or(PathError::HomeDirNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_in_kiln_dir() {
        if let Ok(file) = KilnPaths::config_file() {
            assert!(file.ends_with("kiln/config.toml"));
        }
    }
}
