use std::io;

use thiserror::Error;
use wallbatch_core::BatchFailure;

/// Failure to set up the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid service base url {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] io::Error),
}

/// Failure of the initial submit call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("http {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("server returned non-JSON response (http {status}, content type {content_type})")]
    NonJson { status: u16, content_type: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<SubmitError> for BatchFailure {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Status { status, reason } => BatchFailure::service(Some(status), reason),
            other => BatchFailure::transport(other.to_string()),
        }
    }
}

/// Rejection of a `run_batch` call; nothing was started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchRejected {
    #[error("another batch is still running")]
    Busy { job_id: Option<String> },
    #[error("no async runtime available to run the batch")]
    NoRuntime,
}
