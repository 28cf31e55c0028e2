use std::sync::mpsc;

use wallbatch_core::{JobOutcome, ProgressSnapshot};

/// Receives everything a batch run reports.
///
/// For one run, progress arrives in non-decreasing `processed` order and
/// `on_result` is called exactly once, last.
pub trait BatchObserver: Send + Sync {
    fn on_progress(&self, snapshot: ProgressSnapshot);
    fn on_result(&self, outcome: JobOutcome);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Progress(ProgressSnapshot),
    Finished(JobOutcome),
}

/// Forwards observer calls as [`BatchEvent`]s over a channel.
pub struct ChannelObserver {
    tx: mpsc::Sender<BatchEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<BatchEvent>) -> Self {
        Self { tx }
    }
}

impl BatchObserver for ChannelObserver {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        let _ = self.tx.send(BatchEvent::Progress(snapshot));
    }

    fn on_result(&self, outcome: JobOutcome) {
        let _ = self.tx.send(BatchEvent::Finished(outcome));
    }
}
