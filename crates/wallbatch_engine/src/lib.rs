//! Wallbatch engine: talks to the worker service and runs batches.
mod client;
mod engine;
mod error;
mod observer;
mod orchestrator;
mod poller;
mod settings;

pub use client::{
    classify_status_response, classify_submit_response, error_reason, BatchService,
    ReqwestService, SubmitOutcome,
};
pub use engine::EngineHandle;
pub use error::{BatchRejected, EngineError, SubmitError};
pub use observer::{BatchEvent, BatchObserver, ChannelObserver};
pub use orchestrator::BatchOrchestrator;
pub use poller::StatusPoller;
pub use settings::{EngineSettings, DEFAULT_BASE_URL};
