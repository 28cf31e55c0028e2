use serde::Serialize;

use crate::{BatchRequest, Operation};

pub const NO_RESULT_DATA: &str = "no result data";

/// Account- or message-level counters reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActionTotals {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Distinct sending accounts, reported by share replies only. Items share
    /// one account pool, so the batch value is the largest item value.
    pub senders: Option<u32>,
}

impl ActionTotals {
    pub(crate) fn add(&mut self, other: ActionTotals) {
        self.attempted = self.attempted.saturating_add(other.attempted);
        self.succeeded = self.succeeded.saturating_add(other.succeeded);
        self.failed = self.failed.saturating_add(other.failed);
        self.senders = self.senders.max(other.senders);
    }

    /// Item success as implied by the counters alone.
    pub(crate) fn all_succeeded(&self) -> bool {
        self.succeeded > 0 && self.failed == 0
    }
}

/// One per-account (or per-message) row inside an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRecord {
    pub label: String,
    pub counterpart: Option<String>,
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub target: String,
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub actions: ActionTotals,
    pub details: Vec<DetailRecord>,
}

/// Canonical result of a batch, produced only by [`crate::normalize`].
///
/// `succeeded + failed` never exceeds `total_items`, and equals it for
/// every summary the normalizer returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub(crate) operation: Operation,
    pub(crate) total_items: u32,
    pub(crate) succeeded: u32,
    pub(crate) failed: u32,
    pub(crate) actions: ActionTotals,
    pub(crate) items: Vec<ItemResult>,
    pub(crate) source_urls: Vec<String>,
    pub(crate) message: Option<String>,
    pub(crate) error: Option<String>,
}

impl BatchSummary {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    pub fn succeeded(&self) -> u32 {
        self.succeeded
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    pub fn actions(&self) -> ActionTotals {
        self.actions
    }

    pub fn items(&self) -> &[ItemResult] {
        &self.items
    }

    /// Request URLs echoed back for display.
    pub fn source_urls(&self) -> &[String] {
        &self.source_urls
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Summary for a reply that carried neither `summary` nor `data`.
    pub(crate) fn no_result_data(
        request: &BatchRequest,
        message: Option<String>,
        error: Option<String>,
    ) -> Self {
        let total_items = request.item_count();
        Self {
            operation: request.operation(),
            total_items,
            succeeded: 0,
            failed: total_items,
            actions: ActionTotals::default(),
            items: Vec::new(),
            source_urls: echo_urls(request),
            message,
            error: Some(error.unwrap_or_else(|| NO_RESULT_DATA.to_string())),
        }
    }

    /// Builds a summary from item rows, counting unreported items as failed.
    pub(crate) fn from_items(
        request: &BatchRequest,
        total_items: u32,
        items: Vec<ItemResult>,
        message: Option<String>,
        error: Option<String>,
    ) -> Self {
        let reported = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let total_items = total_items.max(reported);
        let succeeded = u32::try_from(items.iter().filter(|item| item.success).count())
            .unwrap_or(u32::MAX);
        let mut actions = ActionTotals::default();
        for item in &items {
            actions.add(item.actions);
        }

        Self {
            operation: request.operation(),
            total_items,
            succeeded,
            failed: total_items - succeeded,
            actions,
            items,
            source_urls: echo_urls(request),
            message,
            error,
        }
    }
}

fn echo_urls(request: &BatchRequest) -> Vec<String> {
    request
        .targets()
        .iter()
        .map(|target| target.as_str().to_string())
        .collect()
}
