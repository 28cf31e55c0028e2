//! The batch façade: extract, submit, poll, deliver.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use engine_logging::{engine_info, engine_warn, job_info};
use wallbatch_core::{normalize, BatchParams, BatchRequest, JobHandle, JobOutcome, PollSettings};

use crate::{
    BatchObserver, BatchRejected, BatchService, EngineError, EngineSettings, ReqwestService,
    StatusPoller, SubmitOutcome,
};

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Idle,
    Submitting {
        token: u64,
    },
    Polling {
        token: u64,
        handle: JobHandle,
    },
}

/// The single active-job slot. Each run gets a fresh token; a run whose token
/// no longer matches has been cancelled or replaced and must not deliver.
#[derive(Debug, Default)]
struct ActiveSlot {
    next_token: u64,
    state: SlotState,
}

impl ActiveSlot {
    fn current_token(&self) -> Option<u64> {
        match self.state {
            SlotState::Idle => None,
            SlotState::Submitting { token } | SlotState::Polling { token, .. } => Some(token),
        }
    }
}

struct Shared {
    service: Arc<dyn BatchService>,
    poll: PollSettings,
    slot: Mutex<ActiveSlot>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, ActiveSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs at most one batch at a time and reports through a [`BatchObserver`].
#[derive(Clone)]
pub struct BatchOrchestrator {
    shared: Arc<Shared>,
}

impl BatchOrchestrator {
    pub fn new(settings: &EngineSettings) -> Result<Self, EngineError> {
        let service = ReqwestService::new(settings)?;
        engine_info!("using batch service at {}", service.base_url());
        Ok(Self::with_service(Arc::new(service), settings.poll))
    }

    pub fn with_service(service: Arc<dyn BatchService>, poll: PollSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                poll,
                slot: Mutex::new(ActiveSlot::default()),
            }),
        }
    }

    /// The job being polled, if any. `None` while a submission is still in flight.
    pub fn active_job(&self) -> Option<JobHandle> {
        match &self.shared.slot().state {
            SlotState::Polling { handle, .. } => Some(handle.clone()),
            SlotState::Idle | SlotState::Submitting { .. } => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.shared.slot().current_token().is_some()
    }

    /// Abandons the active run. In-flight requests finish on their own but
    /// their results are dropped. Returns whether anything was active.
    pub fn cancel(&self) -> bool {
        let mut slot = self.shared.slot();
        let was_active = slot.current_token().is_some();
        if let SlotState::Polling { handle, .. } = &slot.state {
            job_info!(handle.job_id, "cancelled by caller");
        }
        slot.state = SlotState::Idle;
        was_active
    }

    /// Starts a batch in the background and returns immediately.
    ///
    /// Must be called from within a tokio runtime. A validation failure is
    /// delivered to `observer` before this returns.
    pub fn run_batch(
        &self,
        raw: &str,
        params: BatchParams,
        observer: Arc<dyn BatchObserver>,
    ) -> Result<(), BatchRejected> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| BatchRejected::NoRuntime)?;
        let session = self.claim()?;
        let Ok(request) = prepare(&session, raw, &params, observer.as_ref()) else {
            return Ok(());
        };
        runtime.spawn(async move {
            drive(session, request, observer.as_ref()).await;
        });
        Ok(())
    }

    /// Runs a batch to completion in place.
    ///
    /// The outcome is delivered to `observer` and also returned; `None` means
    /// the run was cancelled and nothing was delivered.
    pub async fn execute(
        &self,
        raw: &str,
        params: BatchParams,
        observer: &dyn BatchObserver,
    ) -> Result<Option<JobOutcome>, BatchRejected> {
        let session = self.claim()?;
        match prepare(&session, raw, &params, observer) {
            Ok(request) => Ok(drive(session, request, observer).await),
            Err(outcome) => Ok(outcome),
        }
    }

    fn claim(&self) -> Result<Session, BatchRejected> {
        let mut slot = self.shared.slot();
        match &slot.state {
            SlotState::Idle => {}
            SlotState::Submitting { .. } => return Err(BatchRejected::Busy { job_id: None }),
            SlotState::Polling { handle, .. } => {
                return Err(BatchRejected::Busy {
                    job_id: Some(handle.job_id.clone()),
                })
            }
        }
        slot.next_token += 1;
        let token = slot.next_token;
        slot.state = SlotState::Submitting { token };
        Ok(Session {
            shared: self.shared.clone(),
            token,
        })
    }
}

/// One claimed run of the slot.
struct Session {
    shared: Arc<Shared>,
    token: u64,
}

impl Session {
    fn is_current(&self) -> bool {
        self.shared.slot().current_token() == Some(self.token)
    }

    /// Records the accepted job. False if the run was abandoned meanwhile.
    fn bind(&self, handle: JobHandle) -> bool {
        let mut slot = self.shared.slot();
        if slot.current_token() != Some(self.token) {
            return false;
        }
        slot.state = SlotState::Polling {
            token: self.token,
            handle,
        };
        true
    }

    /// Frees the slot and delivers `outcome`, unless the run was abandoned.
    fn finish(&self, outcome: JobOutcome, observer: &dyn BatchObserver) -> Option<JobOutcome> {
        {
            let mut slot = self.shared.slot();
            if slot.current_token() != Some(self.token) {
                return None;
            }
            slot.state = SlotState::Idle;
        }
        // Delivered after release so the observer may start the next batch.
        observer.on_result(outcome.clone());
        Some(outcome)
    }
}

/// Builds the request; on failure the slot is released and the validation
/// outcome delivered.
fn prepare(
    session: &Session,
    raw: &str,
    params: &BatchParams,
    observer: &dyn BatchObserver,
) -> Result<BatchRequest, Option<JobOutcome>> {
    BatchRequest::from_raw(raw, params).map_err(|failure| {
        engine_warn!("{} batch rejected: {}", params.operation.label(), failure);
        session.finish(JobOutcome::Failed(failure), observer)
    })
}

async fn drive(
    session: Session,
    request: BatchRequest,
    observer: &dyn BatchObserver,
) -> Option<JobOutcome> {
    let shared = session.shared.clone();
    engine_info!(
        "submitting {} batch of {} targets",
        request.operation().label(),
        request.item_count()
    );

    let outcome = match shared.service.submit(&request).await {
        Err(err) => {
            engine_warn!("submission failed: {}", err);
            JobOutcome::Failed(err.into())
        }
        Ok(SubmitOutcome::Immediate(raw)) => {
            engine_info!("service answered synchronously");
            JobOutcome::Completed(normalize(&raw, &request))
        }
        Ok(SubmitOutcome::Accepted(handle)) => {
            if !session.bind(handle.clone()) {
                job_info!(handle.job_id, "accepted after the run was abandoned");
                return None;
            }
            let poller = StatusPoller::new(shared.service.as_ref(), shared.poll);
            let is_current = || session.is_current();
            poller.poll(handle, &request, observer, &is_current).await?
        }
    };

    session.finish(outcome, observer)
}
