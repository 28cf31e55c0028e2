use std::sync::{mpsc, Arc};
use std::time::Duration;

use wallbatch_core::BatchParams;

use crate::{
    BatchEvent, BatchOrchestrator, BatchRejected, ChannelObserver, EngineError, EngineSettings,
};

/// Owns a tokio runtime and an orchestrator for callers without one.
///
/// Events of every run arrive on one channel, read with [`EngineHandle::recv_timeout`]
/// or [`EngineHandle::try_recv`]. Must not be dropped from inside an async
/// context.
pub struct EngineHandle {
    runtime: tokio::runtime::Runtime,
    orchestrator: BatchOrchestrator,
    event_tx: mpsc::Sender<BatchEvent>,
    event_rx: mpsc::Receiver<BatchEvent>,
}

impl EngineHandle {
    pub fn new(settings: &EngineSettings) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Runtime::new()?;
        let orchestrator = BatchOrchestrator::new(settings)?;
        Ok(Self::with_parts(runtime, orchestrator))
    }

    pub fn with_parts(runtime: tokio::runtime::Runtime, orchestrator: BatchOrchestrator) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            runtime,
            orchestrator,
            event_tx,
            event_rx,
        }
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    pub fn run_batch(&self, raw: &str, params: BatchParams) -> Result<(), BatchRejected> {
        let _guard = self.runtime.enter();
        let observer = Arc::new(ChannelObserver::new(self.event_tx.clone()));
        self.orchestrator.run_batch(raw, params, observer)
    }

    pub fn cancel(&self) -> bool {
        self.orchestrator.cancel()
    }

    pub fn try_recv(&self) -> Option<BatchEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<BatchEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
