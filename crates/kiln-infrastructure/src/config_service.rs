//! Configuration service implementation.
//!
//! Loads the root configuration from `~/.config/kiln/config.toml` (or an
//! explicit path) and caches it.

use crate::paths::KilnPaths;
use crate::storage::AtomicTomlFile;
use kiln_core::Result;
use kiln_core::config::{RootConfig, SessionConfig};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the root configuration.
///
/// The file is read lazily on first access; later reads come from the cache
/// until [`ConfigService::invalidate_cache`] or [`ConfigService::save`].
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<RootConfig>>>,
}

impl ConfigService {
    /// Service over the default config file location.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(KilnPaths::config_file()?))
    }

    /// Service over an explicit config file.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Gets the root configuration, loading from file if not cached. A
    /// missing file yields the defaults.
    pub fn get_config(&self) -> Result<RootConfig> {
        {
            let read_lock = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let loaded = self.file().load()?.unwrap_or_else(|| {
            tracing::debug!("[ConfigService] No config at {:?}, using defaults", self.path);
            RootConfig::default()
        });

        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = Some(loaded.clone());
        Ok(loaded)
    }

    /// Session configuration with the package root filled in.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let mut session = self.get_config()?.session;
        if session.package_root.is_none() {
            session.package_root = KilnPaths::default_package_root().ok();
        }
        Ok(session)
    }

    /// Writes `config` atomically and replaces the cached copy.
    pub fn save(&self, config: &RootConfig) -> Result<()> {
        self.file().save(config)?;
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = Some(config.clone());
        tracing::info!("[ConfigService] Saved config to {:?}", self.path);
        Ok(())
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    fn file(&self) -> AtomicTomlFile<RootConfig> {
        AtomicTomlFile::new(self.path.clone())
    }
}
