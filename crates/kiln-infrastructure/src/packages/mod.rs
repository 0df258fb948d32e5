//! Packages from the local package folder.
//!
//! # Module Structure
//!
//! - `nuspec`: package metadata and dependency groups
//! - `local_registry`: version selection and transitive closure on disk

mod local_registry;
mod nuspec;

pub use local_registry::LocalPackageRegistry;
pub use nuspec::{DependencyGroup, Nuspec, framework_from_nuspec, minimum_version};
