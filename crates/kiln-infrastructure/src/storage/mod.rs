//! File storage helpers.

mod atomic_toml;

pub use atomic_toml::AtomicTomlFile;
