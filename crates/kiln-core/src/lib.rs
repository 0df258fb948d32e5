//! Domain model for Kiln interactive evaluation sessions.
//!
//! This crate holds everything that does not need I/O: reference directives,
//! artifacts and the reference set, framework/runtime/version rules, value
//! snapshots, completion ranking, and the traits of the external
//! collaborators (compiler frontend, package registry, build tool).

pub mod artifact;
pub mod collaborator;
pub mod completion;
pub mod config;
pub mod directive;
pub mod error;
pub mod evaluation;
pub mod framework;
pub mod runtime;
pub mod submission;
pub mod value;
pub mod version;

// Re-export common types
pub use error::{KilnError, ResolutionError, Result};
