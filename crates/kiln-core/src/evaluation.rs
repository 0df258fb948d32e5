//! Evaluation outcomes returned to the caller.

use crate::artifact::ResolvedArtifact;
use crate::error::ResolutionError;
use crate::value::DisplayValue;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One-based line/column position inside a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

/// A static diagnostic produced while classifying or compiling a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable identifier such as `CS0103` or `KILN0001`.
    pub code: Option<String>,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some(SourceLocation { line, column });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "({},{}): ", loc.line, loc.column)?;
        }
        write!(f, "{}", self.severity)?;
        if let Some(code) = &self.code {
            write!(f, " {}", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Description of a fault thrown by submitted code while it ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultDescription {
    /// Fully qualified exception type, e.g. `System.InvalidOperationException`.
    pub type_name: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

impl FaultDescription {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
        }
    }
}

impl fmt::Display for FaultDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// Payload of a successful evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessOutcome {
    /// Sequence index of the committed submission.
    pub submission_index: u64,
    /// Snapshot of the produced value; `None` for statements and declarations.
    pub value: Option<DisplayValue>,
    /// Artifacts this submission added to the session.
    pub added_references: Vec<ResolvedArtifact>,
    /// Complete reference list after commit.
    pub references: Vec<ResolvedArtifact>,
    /// Non-fatal resolution problems, e.g. one project of a solution that
    /// could not be loaded while the others were.
    pub warnings: Vec<ResolutionError>,
}

impl SuccessOutcome {
    pub fn type_name(&self) -> Option<&str> {
        self.value.as_ref().map(DisplayValue::type_name)
    }
}

/// Result of one evaluation attempt. Exactly one variant per attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationResult {
    Success(SuccessOutcome),
    CompileError {
        diagnostics: Vec<Diagnostic>,
    },
    /// A reference directive failed; shaped like a compile error so it renders
    /// the same way, with the structured failure attached.
    ResolutionError {
        error: ResolutionError,
        diagnostics: Vec<Diagnostic>,
    },
    RuntimeFault {
        fault: FaultDescription,
    },
    Cancelled,
    SessionBusy,
}

impl EvaluationResult {
    pub fn resolution_failure(error: ResolutionError) -> Self {
        let diagnostics = vec![Diagnostic::error(error.to_string()).with_code(error.kind())];
        Self::ResolutionError { error, diagnostics }
    }

    /// Like [`Self::resolution_failure`], pointing at the directive's line.
    pub fn resolution_failure_at(error: ResolutionError, line: usize) -> Self {
        let diagnostics = vec![
            Diagnostic::error(error.to_string())
                .with_code(error.kind())
                .at(line, 1),
        ];
        Self::ResolutionError { error, diagnostics }
    }

    pub fn outcome_kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::CompileError { .. } => OutcomeKind::CompileError,
            Self::ResolutionError { .. } => OutcomeKind::ResolutionError,
            Self::RuntimeFault { .. } => OutcomeKind::RuntimeFault,
            Self::Cancelled => OutcomeKind::Cancelled,
            Self::SessionBusy => OutcomeKind::SessionBusy,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn as_success(&self) -> Option<&SuccessOutcome> {
        match self {
            Self::Success(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::CompileError { diagnostics } | Self::ResolutionError { diagnostics, .. } => {
                diagnostics
            }
            _ => &[],
        }
    }
}

/// Coarse classification recorded on each submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    CompileError,
    ResolutionError,
    RuntimeFault,
    Cancelled,
    SessionBusy,
}

impl OutcomeKind {
    /// Outcomes whose environment changes are kept in the session.
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Success | Self::RuntimeFault)
    }
}
