use crate::history::AttemptHistory;
use kiln_application::{
    CompletionProvider, ReferenceArtifactResolver, SearchContext, SessionState, SessionStateCell,
};
use kiln_core::artifact::ReferenceSet;
use kiln_core::collaborator::{
    BuildTool, CompileOutcome, CompileRequest, CompilerFrontend, EnvironmentHandle,
    PackageRegistry, ProjectReader,
};
use kiln_core::completion::Completions;
use kiln_core::config::{BusyPolicy, SessionConfig};
use kiln_core::directive::{ReferenceDirective, SubmissionPlan};
use kiln_core::evaluation::{Diagnostic, EvaluationResult, OutcomeKind, SuccessOutcome};
use kiln_core::submission::Submission;
use kiln_core::value::{DisplayValue, OutputSnapshotter};
use kiln_core::{KilnError, ResolutionError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// External services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub frontend: Arc<dyn CompilerFrontend>,
    pub registry: Arc<dyn PackageRegistry>,
    pub project_reader: Arc<dyn ProjectReader>,
    pub build_tool: Arc<dyn BuildTool>,
}

/// References gathered from a submission's directives, not yet committed.
struct ResolvedDirectives {
    candidate: ReferenceSet,
    warnings: Vec<ResolutionError>,
}

/// One interactive session.
///
/// At most one submission is evaluated at a time; what happens to a second
/// concurrent one depends on [`BusyPolicy`]. Completion and history readers
/// never wait for an evaluation.
pub struct Evaluator {
    id: String,
    config: SessionConfig,
    context: SearchContext,
    frontend: Arc<dyn CompilerFrontend>,
    resolver: ReferenceArtifactResolver,
    completions: CompletionProvider,
    snapshotter: OutputSnapshotter,
    state: SessionStateCell,
    history: AttemptHistory,
    gate: Mutex<()>,
    next_index: AtomicU64,
}

impl Evaluator {
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            frontend,
            registry,
            project_reader,
            build_tool,
        } = collaborators;

        let id = uuid::Uuid::new_v4().to_string();
        let initial = SessionState::new(frontend.initial_environment());
        tracing::info!(
            "[Evaluator] Session {} started ({} on {})",
            id,
            config.target_framework,
            config.runtime_identifier
        );

        Self {
            id,
            context: SearchContext::from_config(&config),
            resolver: ReferenceArtifactResolver::new(registry, project_reader, build_tool),
            completions: CompletionProvider::new(frontend.clone()),
            snapshotter: OutputSnapshotter::new(config.preview_limit),
            frontend,
            config,
            state: SessionStateCell::new(initial),
            history: AttemptHistory::new(),
            gate: Mutex::new(()),
            next_index: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Latest committed state.
    pub async fn snapshot(&self) -> Arc<SessionState> {
        self.state.snapshot().await
    }

    pub fn history(&self) -> &AttemptHistory {
        &self.history
    }

    pub fn resolver(&self) -> &ReferenceArtifactResolver {
        &self.resolver
    }

    /// Evaluates one submission and records the attempt.
    pub async fn evaluate(&self, text: &str, cancel: &CancellationToken) -> EvaluationResult {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst) + 1;

        let result = match self.acquire_gate().await {
            Some(_guard) => self.evaluate_exclusive(index, text, cancel).await,
            None => {
                tracing::warn!("[Evaluator] Submission #{} rejected: session busy", index);
                EvaluationResult::SessionBusy
            }
        };

        self.history
            .record(Submission::new(index, text, result.outcome_kind()))
            .await;
        result
    }

    /// Ranks completions for `text` against the committed environment.
    pub async fn complete(&self, text: &str, cursor: usize) -> Result<Completions> {
        let state = self.state.snapshot().await;
        self.completions.complete(&state, text, cursor).await
    }

    /// Tears the session down, handing the committed environment back to the
    /// compiler frontend.
    pub async fn shutdown(self) {
        let state = self.state.snapshot().await;
        tracing::info!(
            "[Evaluator] Session {} ending after {} committed submissions",
            self.id,
            state.submissions().len()
        );
        self.frontend.release(state.environment().clone()).await;
    }

    async fn acquire_gate(&self) -> Option<MutexGuard<'_, ()>> {
        match self.config.busy_policy {
            BusyPolicy::Reject => self.gate.try_lock().ok(),
            BusyPolicy::Queue => Some(self.gate.lock().await),
        }
    }

    async fn evaluate_exclusive(
        &self,
        index: u64,
        text: &str,
        cancel: &CancellationToken,
    ) -> EvaluationResult {
        let plan = match SubmissionPlan::parse(text) {
            Ok(plan) => plan,
            Err(diagnostics) => {
                tracing::debug!(
                    "[Evaluator] Submission #{} has {} directive error(s)",
                    index,
                    diagnostics.len()
                );
                return EvaluationResult::CompileError { diagnostics };
            }
        };

        let base = self.state.snapshot().await;
        let resolved = match self.resolve_directives(&plan, &base, cancel).await {
            Ok(resolved) => resolved,
            Err(result) => return result,
        };

        if cancel.is_cancelled() {
            return EvaluationResult::Cancelled;
        }

        if !plan.has_code() {
            return self
                .commit_success(index, text, &base, resolved, None, base.environment().clone())
                .await;
        }

        let request = CompileRequest {
            environment: base.environment(),
            references: &resolved.candidate,
            source: &plan.code,
            submission_index: index,
        };
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return EvaluationResult::Cancelled,
            outcome = self.frontend.compile_and_run(request, cancel) => outcome,
        };

        match outcome {
            Ok(CompileOutcome::Completed { value, environment }) => {
                if cancel.is_cancelled() {
                    self.frontend.release(environment).await;
                    return EvaluationResult::Cancelled;
                }
                let value = value.map(|raw| self.snapshotter.snapshot(raw));
                self.commit_success(index, text, &base, resolved, value, environment)
                    .await
            }
            Ok(CompileOutcome::Diagnostics(diagnostics)) => {
                tracing::debug!(
                    "[Evaluator] Submission #{} discarded: {} diagnostic(s)",
                    index,
                    diagnostics.len()
                );
                EvaluationResult::CompileError { diagnostics }
            }
            Ok(CompileOutcome::Faulted { fault, environment }) => {
                if cancel.is_cancelled() {
                    self.frontend.release(environment).await;
                    return EvaluationResult::Cancelled;
                }
                // The environment moves on; references stay as they were.
                let next = base.committed(
                    Submission::new(index, text, OutcomeKind::RuntimeFault),
                    base.references().clone(),
                    environment,
                );
                self.state.replace(next).await;
                tracing::info!("[Evaluator] Submission #{} faulted: {}", index, fault);
                EvaluationResult::RuntimeFault { fault }
            }
            Err(KilnError::Cancelled) => EvaluationResult::Cancelled,
            Err(err) => {
                tracing::error!("[Evaluator] Compiler frontend failed on #{}: {}", index, err);
                EvaluationResult::CompileError {
                    diagnostics: vec![Diagnostic::error(format!(
                        "Compiler frontend failure: {}",
                        err
                    ))],
                }
            }
        }
    }

    async fn resolve_directives(
        &self,
        plan: &SubmissionPlan,
        base: &SessionState,
        cancel: &CancellationToken,
    ) -> std::result::Result<ResolvedDirectives, EvaluationResult> {
        let mut candidate = base.references().clone();
        let mut warnings = Vec::new();

        for located in &plan.directives {
            if let ReferenceDirective::Package { name, version } = &located.directive {
                if candidate.contains_package(name, version.as_ref()) {
                    tracing::debug!("[Evaluator] {} already referenced, skipping", located.directive);
                    continue;
                }
            }

            match self
                .resolver
                .resolve(&located.directive, &self.context, cancel)
                .await
            {
                Ok(resolution) => {
                    tracing::info!("[Evaluator] {}", resolution.summary);
                    warnings.extend(resolution.warnings);
                    for shadowed in candidate.merge(resolution.artifacts, &self.context.runtime) {
                        tracing::warn!("[Evaluator] {}", shadowed);
                        warnings.push(shadowed);
                    }
                }
                Err(KilnError::Cancelled) => return Err(EvaluationResult::Cancelled),
                Err(KilnError::Resolution(err)) => {
                    tracing::info!("[Evaluator] {} failed: {}", located.directive, err);
                    return Err(EvaluationResult::resolution_failure_at(err, located.line));
                }
                Err(err) => {
                    tracing::error!("[Evaluator] {} failed: {}", located.directive, err);
                    return Err(EvaluationResult::CompileError {
                        diagnostics: vec![Diagnostic::error(err.to_string()).at(located.line, 1)],
                    });
                }
            }
        }

        Ok(ResolvedDirectives {
            candidate,
            warnings,
        })
    }

    async fn commit_success(
        &self,
        index: u64,
        text: &str,
        base: &SessionState,
        resolved: ResolvedDirectives,
        value: Option<DisplayValue>,
        environment: EnvironmentHandle,
    ) -> EvaluationResult {
        let ResolvedDirectives {
            candidate,
            warnings,
        } = resolved;
        let added_references = candidate.added_since(base.references());
        let references = candidate.to_vec();

        let next = base.committed(
            Submission::new(index, text, OutcomeKind::Success),
            candidate,
            environment,
        );
        self.state.replace(next).await;
        tracing::debug!(
            "[Evaluator] Committed #{} (+{} references, {} total)",
            index,
            added_references.len(),
            references.len()
        );

        EvaluationResult::Success(SuccessOutcome {
            submission_index: index,
            value,
            added_references,
            references,
            warnings,
        })
    }
}
