//! Status polling as an explicit state machine.
//!
//! The machine never sleeps or performs IO. Like the UI `update` loop it
//! consumes events and hands back [`PollEffect`]s for a driver to execute:
//! wait, issue one status check, forward progress, or finish.

use std::time::Duration;

use serde_json::Value;

use crate::shape::{number, text};
use crate::{normalize, BatchFailure, BatchRequest, JobHandle, JobOutcome, ProgressSnapshot};

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

const JOB_FAILED_DEFAULT: &str = "job failed without a reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay before the first check; a fresh job is rarely done.
    pub initial_delay: Duration,
    /// Delay between subsequent checks.
    pub interval: Duration,
    /// Hard ceiling on status checks per job.
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `attempt` counts the checks issued so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Scheduled { attempt: u32 },
    InFlight { attempt: u32 },
    Completed,
    Failed,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollState::Completed | PollState::Failed | PollState::TimedOut
        )
    }
}

/// One status endpoint reply, already classified.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReply {
    Processing {
        processed: Option<u32>,
        current_target: Option<String>,
    },
    Completed {
        result: Value,
    },
    Failed {
        error: Option<String>,
    },
    /// A status value this client does not know.
    Unrecognized {
        status: String,
    },
    /// The check itself failed: network, HTTP status or unparsable body.
    Unreachable {
        reason: String,
    },
}

impl StatusReply {
    /// Classifies a parsed status body `{ status, processedPosts?, currentPost?, result?, error? }`.
    pub fn from_body(body: &Value) -> Self {
        let Some(obj) = body.as_object() else {
            return StatusReply::Unreachable {
                reason: "status reply is not an object".to_string(),
            };
        };
        let status = obj.get("status").and_then(Value::as_str).unwrap_or("");
        match status {
            "processing" => StatusReply::Processing {
                processed: obj
                    .get("processedPosts")
                    .and_then(number)
                    .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
                current_target: text(obj, "currentPost"),
            },
            "completed" => StatusReply::Completed {
                result: obj.get("result").cloned().unwrap_or(Value::Null),
            },
            "failed" => StatusReply::Failed {
                error: text(obj, "error"),
            },
            other => StatusReply::Unrecognized {
                status: other.to_string(),
            },
        }
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            StatusReply::Unrecognized { .. } | StatusReply::Unreachable { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEffect {
    /// Arm the single timer; call [`PollMachine::timer_fired`] when it expires.
    Wait(Duration),
    /// Issue one status request; feed the reply to [`PollMachine::apply`].
    Check { job_id: String, attempt: u32 },
    Progress(ProgressSnapshot),
    Finish(JobOutcome),
}

#[derive(Debug, Clone)]
pub struct PollMachine {
    handle: JobHandle,
    request: BatchRequest,
    settings: PollSettings,
    state: PollState,
    last_processed: Option<u32>,
    transient_failures: u32,
}

impl PollMachine {
    pub fn new(handle: JobHandle, request: BatchRequest, settings: PollSettings) -> Self {
        Self {
            handle,
            request,
            settings,
            state: PollState::Scheduled { attempt: 0 },
            last_processed: None,
            transient_failures: 0,
        }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Checks that returned no usable status so far.
    pub fn transient_failures(&self) -> u32 {
        self.transient_failures
    }

    /// Arms the initial delay.
    pub fn begin(&self) -> Vec<PollEffect> {
        match self.state {
            PollState::Scheduled { attempt: 0 } => vec![PollEffect::Wait(self.settings.initial_delay)],
            _ => Vec::new(),
        }
    }

    /// The armed timer expired: issue the next check.
    pub fn timer_fired(&mut self) -> Vec<PollEffect> {
        let PollState::Scheduled { attempt } = self.state else {
            return Vec::new();
        };
        if attempt >= self.settings.max_attempts {
            return self.time_out(attempt);
        }
        let attempt = attempt + 1;
        self.state = PollState::InFlight { attempt };
        vec![PollEffect::Check {
            job_id: self.handle.job_id.clone(),
            attempt,
        }]
    }

    /// Applies the reply of the in-flight check for `job_id`.
    ///
    /// Replies for another job, or arriving while no check is in flight, are
    /// stale and produce no effects.
    pub fn apply(&mut self, job_id: &str, reply: StatusReply) -> Vec<PollEffect> {
        if job_id != self.handle.job_id {
            return Vec::new();
        }
        let PollState::InFlight { attempt } = self.state else {
            return Vec::new();
        };

        match reply {
            StatusReply::Completed { result } => {
                self.state = PollState::Completed;
                let summary = normalize(&result, &self.request);
                vec![PollEffect::Finish(JobOutcome::Completed(summary))]
            }
            StatusReply::Failed { error } => {
                self.state = PollState::Failed;
                let reason = error.unwrap_or_else(|| JOB_FAILED_DEFAULT.to_string());
                vec![PollEffect::Finish(JobOutcome::Failed(BatchFailure::service(
                    None, reason,
                )))]
            }
            StatusReply::Processing {
                processed,
                current_target,
            } => {
                let mut effects = Vec::with_capacity(2);
                if let Some(snapshot) = self.snapshot(processed, current_target) {
                    effects.push(PollEffect::Progress(snapshot));
                }
                effects.extend(self.reschedule(attempt));
                effects
            }
            transient => {
                debug_assert!(transient.is_transient());
                self.transient_failures += 1;
                self.reschedule(attempt)
            }
        }
    }

    fn snapshot(
        &mut self,
        processed: Option<u32>,
        current_target: Option<String>,
    ) -> Option<ProgressSnapshot> {
        let processed = processed?.min(self.handle.total_items);
        if self.last_processed.is_some_and(|last| processed < last) {
            return None;
        }
        self.last_processed = Some(processed);
        Some(ProgressSnapshot {
            job_id: self.handle.job_id.clone(),
            processed,
            total: self.handle.total_items,
            current_target,
        })
    }

    fn reschedule(&mut self, attempt: u32) -> Vec<PollEffect> {
        if attempt >= self.settings.max_attempts {
            return self.time_out(attempt);
        }
        self.state = PollState::Scheduled { attempt };
        vec![PollEffect::Wait(self.settings.interval)]
    }

    fn time_out(&mut self, attempts: u32) -> Vec<PollEffect> {
        self.state = PollState::TimedOut;
        vec![PollEffect::Finish(JobOutcome::TimedOut {
            job_id: self.handle.job_id.clone(),
            attempts,
        })]
    }
}
