//! Compiler frontend interface.

use crate::artifact::ReferenceSet;
use crate::completion::SymbolCandidate;
use crate::error::Result;
use crate::evaluation::{Diagnostic, FaultDescription};
use crate::value::RawValue;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Opaque compiler environment: every symbol, type and import established by
/// the committed submissions of a session.
///
/// The frontend creates and interprets the contents; the session only stores
/// the handle and passes it back. A handle is never mutated; compiling
/// produces a new one, which replaces the old at commit.
#[derive(Clone)]
pub struct EnvironmentHandle {
    generation: u64,
    state: Arc<dyn Any + Send + Sync>,
}

impl EnvironmentHandle {
    /// First environment of a session.
    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self {
            generation: 0,
            state: Arc::new(state),
        }
    }

    /// Environment derived from this one by compiling another submission.
    pub fn successor<T: Any + Send + Sync>(&self, state: T) -> Self {
        Self {
            generation: self.generation + 1,
            state: Arc::new(state),
        }
    }

    /// Number of environments between this one and the session's first.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }
}

impl fmt::Debug for EnvironmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Inputs for compiling and running one piece of code.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Committed environment the code is compiled against.
    pub environment: &'a EnvironmentHandle,
    /// References visible to the code (committed plus this submission's).
    pub references: &'a ReferenceSet,
    pub source: &'a str,
    pub submission_index: u64,
}

/// What the frontend reports after compiling and (maybe) running code.
#[derive(Debug)]
pub enum CompileOutcome {
    /// Compiled and ran to completion. `value` is absent for statements.
    Completed {
        value: Option<RawValue>,
        environment: EnvironmentHandle,
    },
    /// Static errors; nothing ran.
    Diagnostics(Vec<Diagnostic>),
    /// Compiled, then threw while running. `environment` holds whatever
    /// declarations took effect before the fault.
    Faulted {
        fault: FaultDescription,
        environment: EnvironmentHandle,
    },
}

/// Parses, binds, emits and runs submissions. Supplied by the host.
#[async_trait]
pub trait CompilerFrontend: Send + Sync {
    /// Environment for a fresh session.
    fn initial_environment(&self) -> EnvironmentHandle;

    /// Compiles `request.source` against the given environment and runs it.
    ///
    /// Errors returned here are failures of the frontend itself, not of the
    /// submitted code.
    async fn compile_and_run(
        &self,
        request: CompileRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CompileOutcome>;

    /// Symbols visible at `cursor` in `text`.
    async fn enumerate_symbols(
        &self,
        environment: &EnvironmentHandle,
        text: &str,
        cursor: usize,
    ) -> Result<Vec<SymbolCandidate>>;

    /// Releases whatever the frontend holds for an environment at session end.
    async fn release(&self, _environment: EnvironmentHandle) {}
}
