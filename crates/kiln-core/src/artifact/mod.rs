//! Resolved artifacts and the session's reference set.

mod model;
mod reference_set;

pub use model::{ArtifactIdentity, ArtifactSource, Resolution, ResolvedArtifact};
pub use reference_set::{MergeOutcome, ReferenceSet};
