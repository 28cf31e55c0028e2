use std::fmt;

use serde::Serialize;

use crate::BatchSummary;

/// Incremental progress of an accepted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub job_id: String,
    pub processed: u32,
    pub total: u32,
    pub current_target: Option<String>,
}

/// Terminal result of one batch run. Nothing is delivered after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobOutcome {
    Completed(BatchSummary),
    Failed(BatchFailure),
    TimedOut { job_id: String, attempts: u32 },
}

impl JobOutcome {
    /// `true` for a completed job whose summary carries no error.
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed(summary) if !summary.is_error())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {reason}")]
pub struct BatchFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl BatchFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation, reason)
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, reason)
    }

    pub fn service(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Service { status }, reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// No usable targets, or a request the service would reject outright.
    Validation,
    /// Network failure or a response that is not the JSON we expect.
    Transport,
    /// The service reported the failure itself.
    Service { status: Option<u16> },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Validation => write!(f, "validation error"),
            FailureKind::Transport => write!(f, "transport error"),
            FailureKind::Service { status: Some(code) } => write!(f, "service error (http {code})"),
            FailureKind::Service { status: None } => write!(f, "service error"),
        }
    }
}
