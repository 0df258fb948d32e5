use crate::evaluation::OutcomeKind;
use serde::{Deserialize, Serialize};

/// Immutable record of one evaluation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Position in the session's attempt sequence, starting at 1.
    pub index: u64,
    pub source: String,
    pub outcome: OutcomeKind,
    /// RFC 3339 timestamp of when the attempt finished.
    pub submitted_at: String,
}

impl Submission {
    pub fn new(index: u64, source: impl Into<String>, outcome: OutcomeKind) -> Self {
        Self {
            index,
            source: source.into(),
            outcome,
            submitted_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
