use kiln_core::artifact::ReferenceSet;
use kiln_core::collaborator::EnvironmentHandle;
use kiln_core::submission::Submission;

/// Everything a session has committed so far.
///
/// The environment handle reflects exactly the committed submissions and
/// references. A `SessionState` is never mutated in place: the commit step
/// builds a successor with [`SessionState::committed`] and publishes it.
#[derive(Debug, Clone)]
pub struct SessionState {
    submissions: Vec<Submission>,
    references: ReferenceSet,
    environment: EnvironmentHandle,
}

impl SessionState {
    /// Empty state around the compiler's initial environment.
    pub fn new(environment: EnvironmentHandle) -> Self {
        Self {
            submissions: Vec::new(),
            references: ReferenceSet::new(),
            environment,
        }
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    pub fn environment(&self) -> &EnvironmentHandle {
        &self.environment
    }

    pub fn last_submission(&self) -> Option<&Submission> {
        self.submissions.last()
    }

    /// Successor state with `submission` appended.
    pub fn committed(
        &self,
        submission: Submission,
        references: ReferenceSet,
        environment: EnvironmentHandle,
    ) -> Self {
        let mut submissions = self.submissions.clone();
        submissions.push(submission);
        Self {
            submissions,
            references,
            environment,
        }
    }
}
