use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::target::{extract_targets_for, Target, TargetKind};
use crate::BatchFailure;

pub const TOKEN_COUNT_MIN: u32 = 1;
pub const TOKEN_COUNT_MAX: u32 = 100;
pub const TOKEN_COUNT_DEFAULT: u32 = 10;

/// Operation kinds offered by the worker service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Like,
    Share,
    Subscribe,
}

/// Field names of the per-kind sub-summary counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CounterFields {
    pub total: &'static str,
    pub succeeded: &'static str,
    pub failed: &'static str,
    pub senders: Option<&'static str>,
}

impl Operation {
    pub fn target_kind(self) -> TargetKind {
        match self {
            Operation::Like | Operation::Share => TargetKind::WallPost,
            Operation::Subscribe => TargetKind::Community,
        }
    }

    /// Submit path relative to the service base URL.
    pub fn submit_path(self) -> &'static str {
        match self {
            Operation::Like => "like/posts",
            Operation::Share => "share/posts",
            Operation::Subscribe => "subscribe/public",
        }
    }

    /// Status path prefix; the job id is appended as the last segment.
    pub fn status_prefix(self) -> &'static str {
        match self {
            Operation::Like => "like/status",
            Operation::Share => "share/status",
            Operation::Subscribe => "subscribe/status",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Operation::Like => "like",
            Operation::Share => "share",
            Operation::Subscribe => "subscribe",
        }
    }

    pub(crate) fn counter_fields(self) -> CounterFields {
        match self {
            Operation::Like => CounterFields {
                total: "totalAccounts",
                succeeded: "successfulLikes",
                failed: "failedLikes",
                senders: None,
            },
            Operation::Share => CounterFields {
                total: "totalMessages",
                succeeded: "successfulMessages",
                failed: "failedMessages",
                senders: Some("totalSenders"),
            },
            Operation::Subscribe => CounterFields {
                total: "totalAccounts",
                succeeded: "successfulSubscriptions",
                failed: "failedSubscriptions",
                senders: None,
            },
        }
    }
}

/// Caller-supplied parameters of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchParams {
    pub operation: Operation,
    /// Accounts per post, only meaningful for [`Operation::Like`].
    pub token_count: Option<u32>,
}

impl BatchParams {
    pub fn like(token_count: u32) -> Self {
        Self {
            operation: Operation::Like,
            token_count: Some(token_count),
        }
    }

    pub fn share() -> Self {
        Self {
            operation: Operation::Share,
            token_count: None,
        }
    }

    pub fn subscribe() -> Self {
        Self {
            operation: Operation::Subscribe,
            token_count: None,
        }
    }
}

/// A validated, non-empty batch ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    operation: Operation,
    targets: Vec<Target>,
    token_count: Option<u32>,
}

impl BatchRequest {
    pub fn new(params: &BatchParams, targets: Vec<Target>) -> Result<Self, BatchFailure> {
        if targets.is_empty() {
            return Err(BatchFailure::validation("no valid target links found"));
        }
        if params.operation == Operation::Subscribe && targets.len() > 1 {
            return Err(BatchFailure::validation(format!(
                "subscribe accepts a single community link, got {}",
                targets.len()
            )));
        }

        let token_count = match params.operation {
            Operation::Like => Some(clamp_token_count(
                params.token_count.unwrap_or(TOKEN_COUNT_DEFAULT),
            )),
            Operation::Share | Operation::Subscribe => None,
        };

        Ok(Self {
            operation: params.operation,
            targets,
            token_count,
        })
    }

    /// Extracts targets for the operation and validates the result.
    pub fn from_raw(raw: &str, params: &BatchParams) -> Result<Self, BatchFailure> {
        let targets = extract_targets_for(params.operation.target_kind(), raw);
        Self::new(params, targets)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn token_count(&self) -> Option<u32> {
        self.token_count
    }

    pub fn item_count(&self) -> u32 {
        u32::try_from(self.targets.len()).unwrap_or(u32::MAX)
    }

    /// JSON body for the submit endpoint.
    pub fn body(&self) -> Value {
        match self.operation {
            Operation::Like => json!({
                "postUrls": self.targets,
                "tokenCount": self.token_count.unwrap_or(TOKEN_COUNT_DEFAULT),
            }),
            Operation::Share => json!({ "postUrls": self.targets }),
            Operation::Subscribe => json!({ "publicUrl": self.targets[0] }),
        }
    }

    pub fn job_handle(&self, job_id: impl Into<String>) -> JobHandle {
        JobHandle {
            job_id: job_id.into(),
            total_items: self.item_count(),
        }
    }
}

pub fn clamp_token_count(count: u32) -> u32 {
    count.clamp(TOKEN_COUNT_MIN, TOKEN_COUNT_MAX)
}

/// An accepted asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobHandle {
    pub job_id: String,
    pub total_items: u32,
}
