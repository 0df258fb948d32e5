//! Evaluation sessions for Kiln.
//!
//! [`Evaluator`] owns one session: it serializes submissions, resolves their
//! reference directives, runs the code through the compiler frontend and
//! commits or discards the result.

pub mod evaluator;
pub mod history;
pub mod tracing_layer;

pub use evaluator::{Collaborators, Evaluator};
pub use history::AttemptHistory;
