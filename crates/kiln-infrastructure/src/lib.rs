//! Infrastructure adapters for Kiln.
//!
//! Concrete implementations of the collaborator traits from `kiln-core`
//! against the local machine: configuration on disk, MSBuild project files,
//! the `dotnet` CLI and the local package folder.

pub mod config_service;
pub mod dotnet_build_tool;
pub mod msbuild;
pub mod packages;
pub mod paths;
pub mod storage;
mod xml;

pub use config_service::ConfigService;
pub use dotnet_build_tool::DotnetBuildTool;
pub use msbuild::MsBuildProjectReader;
pub use packages::LocalPackageRegistry;
pub use paths::KilnPaths;
