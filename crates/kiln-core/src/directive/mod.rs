//! Reference directives and submission classification.
//!
//! # Module Structure
//!
//! - `model`: the closed [`ReferenceDirective`] variant and its text form
//! - `plan`: splitting a submission into leading directives and code

mod model;
mod plan;

pub use model::{DirectiveError, ReferenceDirective};
pub use plan::{LocatedDirective, SubmissionPlan};
