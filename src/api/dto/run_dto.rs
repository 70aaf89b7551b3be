//! Reconciliation run DTOs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::commit::ReconciliationResult;
use crate::service::{RunSummary, StoreOutcome};

/// Outcome of one store within a run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoreOutcomeDto {
    /// `completed`, `partial` or `failed`.
    pub status: String,
    /// Commit counters, absent when the store failed.
    pub result: Option<ReconciliationResult>,
    /// Failure reason, absent when the store completed.
    pub error: Option<String>,
}

impl From<StoreOutcome> for StoreOutcomeDto {
    fn from(outcome: StoreOutcome) -> Self {
        match outcome {
            StoreOutcome::Completed(result) => Self {
                status: (if result.is_partial() { "partial" } else { "completed" }).to_string(),
                result: Some(result),
                error: None,
            },
            StoreOutcome::Failed { error } => Self {
                status: "failed".to_string(),
                result: None,
                error: Some(error),
            },
        }
    }
}

/// Response body for `POST /runs`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunSummaryResponse {
    /// Run identifier.
    pub run_id: uuid::Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Outcome per store.
    pub stores: BTreeMap<String, StoreOutcomeDto>,
}

impl From<RunSummary> for RunSummaryResponse {
    fn from(summary: RunSummary) -> Self {
        Self {
            run_id: *summary.run_id.as_uuid(),
            started_at: summary.started_at,
            finished_at: summary.finished_at,
            stores: summary
                .stores
                .into_iter()
                .map(|(name, outcome)| (name, outcome.into()))
                .collect(),
        }
    }
}
