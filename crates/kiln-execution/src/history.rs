use kiln_core::evaluation::OutcomeKind;
use kiln_core::submission::Submission;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Every evaluation attempt of a session, committed or not, in order.
#[derive(Clone, Default)]
pub struct AttemptHistory {
    attempts: Arc<RwLock<Vec<Submission>>>,
}

impl AttemptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, submission: Submission) {
        tracing::debug!(
            "[AttemptHistory] #{} -> {}",
            submission.index,
            submission.outcome
        );
        self.attempts.write().await.push(submission);
    }

    pub async fn all(&self) -> Vec<Submission> {
        self.attempts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.attempts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.attempts.read().await.is_empty()
    }

    /// Attempts with the given outcome, e.g. every `CompileError`.
    pub async fn with_outcome(&self, outcome: OutcomeKind) -> Vec<Submission> {
        self.attempts
            .read()
            .await
            .iter()
            .filter(|s| s.outcome == outcome)
            .cloned()
            .collect()
    }
}
