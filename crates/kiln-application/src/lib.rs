//! Application layer for Kiln.
//!
//! This crate coordinates the domain model with the external collaborators:
//! resolving reference directives into artifacts, holding committed session
//! state, and serving completions against it.

pub mod completion;
pub mod resolver;
pub mod session;

pub use completion::CompletionProvider;
pub use resolver::{ReferenceArtifactResolver, SearchContext};
pub use session::{SessionState, SessionStateCell};
