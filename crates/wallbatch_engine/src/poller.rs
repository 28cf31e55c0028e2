use std::collections::VecDeque;

use engine_logging::{job_debug, job_info, job_warn};
use wallbatch_core::{
    BatchRequest, JobHandle, JobOutcome, PollEffect, PollMachine, PollSettings, StatusReply,
};

use crate::{BatchObserver, BatchService};

/// Drives a [`PollMachine`] against the status endpoint.
///
/// Effects run strictly one after another, so a job never has more than one
/// timer or status request outstanding.
pub struct StatusPoller<'a> {
    service: &'a dyn BatchService,
    settings: PollSettings,
}

impl<'a> StatusPoller<'a> {
    pub fn new(service: &'a dyn BatchService, settings: PollSettings) -> Self {
        Self { service, settings }
    }

    /// Polls until a terminal outcome, which is returned rather than
    /// delivered. Progress goes to `observer` as it arrives.
    ///
    /// `is_current` is consulted before every effect; once it turns false the
    /// job has been abandoned and `None` is returned without further calls.
    pub async fn poll(
        &self,
        handle: JobHandle,
        request: &BatchRequest,
        observer: &dyn BatchObserver,
        is_current: &(dyn Fn() -> bool + Send + Sync),
    ) -> Option<JobOutcome> {
        let operation = request.operation();
        let job = handle.job_id.clone();
        job_info!(
            job,
            "polling {} status for {} items (max {} checks)",
            operation.label(),
            handle.total_items,
            self.settings.max_attempts
        );

        let mut machine = PollMachine::new(handle, request.clone(), self.settings);
        let mut pending: VecDeque<PollEffect> = machine.begin().into();

        while let Some(effect) = pending.pop_front() {
            if !is_current() {
                job_info!(job, "abandoned, ignoring further status");
                return None;
            }
            match effect {
                PollEffect::Wait(delay) => {
                    tokio::time::sleep(delay).await;
                    pending.extend(machine.timer_fired());
                }
                PollEffect::Check { job_id, attempt } => {
                    job_debug!(job_id, "status check {}/{}", attempt, self.settings.max_attempts);
                    let reply = self.service.status(operation, &job_id).await;
                    match &reply {
                        StatusReply::Unreachable { reason } => {
                            job_warn!(job_id, "status check {} failed: {}", attempt, reason);
                        }
                        StatusReply::Unrecognized { status } => {
                            job_warn!(job_id, "unknown status {:?}, retrying", status);
                        }
                        _ => {}
                    }
                    pending.extend(machine.apply(&job_id, reply));
                }
                PollEffect::Progress(snapshot) => {
                    job_debug!(job, "processed {}/{}", snapshot.processed, snapshot.total);
                    observer.on_progress(snapshot);
                }
                PollEffect::Finish(outcome) => {
                    match &outcome {
                        JobOutcome::Completed(_) => job_info!(job, "completed"),
                        JobOutcome::Failed(failure) => job_warn!(job, "failed: {}", failure),
                        JobOutcome::TimedOut { attempts, .. } => {
                            job_warn!(job, "gave up after {} status checks", attempts)
                        }
                    }
                    return Some(outcome);
                }
            }
        }

        job_warn!(job, "poll machine stopped without an outcome");
        None
    }
}
