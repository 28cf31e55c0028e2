//! Wallbatch core: pure batch logic with no IO.
//!
//! Target extraction, request validation, reply normalization and the status
//! polling state machine live here so they can be tested without a network.
mod normalize;
mod outcome;
mod poll;
mod request;
mod shape;
mod summary;
mod target;

pub use normalize::{normalize, UNKNOWN_SENDER};
pub use outcome::{BatchFailure, FailureKind, JobOutcome, ProgressSnapshot};
pub use poll::{
    PollEffect, PollMachine, PollSettings, PollState, StatusReply, DEFAULT_INITIAL_DELAY,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL,
};
pub use request::{
    clamp_token_count, BatchParams, BatchRequest, JobHandle, Operation, TOKEN_COUNT_DEFAULT,
    TOKEN_COUNT_MAX, TOKEN_COUNT_MIN,
};
pub use summary::{ActionTotals, BatchSummary, DetailRecord, ItemResult, NO_RESULT_DATA};
pub use target::{extract_targets, extract_targets_for, render_targets, Target, TargetKind};
