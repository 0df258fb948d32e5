//! Interfaces of the external collaborators the session drives.
//!
//! # Module Structure
//!
//! - `compiler`: the compiler frontend and its opaque environment handle
//! - `registry`: package manifests and fetching
//! - `build`: project/solution reading and building

mod build;
mod compiler;
mod registry;

pub use build::{
    BuildOutput, BuildTool, PackageReference, ProjectDescriptor, ProjectReader, SolutionDescriptor,
};
pub use compiler::{CompileOutcome, CompileRequest, CompilerFrontend, EnvironmentHandle};
pub use registry::{FetchedPackage, PackageAsset, PackageDependency, PackageManifest, PackageRegistry};
