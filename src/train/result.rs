//! Stage result types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checkpoint::CheckpointHandle;

/// Why a stage stopped training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    MaxEpochsReached,
    EarlyStopped,
    ValidationSkipped,
    Cancelled,
    Failed,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::MaxEpochsReached => "max_epochs_reached",
            TerminationReason::EarlyStopped => "early_stopped",
            TerminationReason::ValidationSkipped => "validation_skipped",
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::Failed => "failed",
        }
    }

    /// Whether the stage produced a model the next stage may start from.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TerminationReason::MaxEpochsReached
                | TerminationReason::EarlyStopped
                | TerminationReason::ValidationSkipped
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage; created once, never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_index: i64,
    /// Position of the stage in the pipeline
    pub position: usize,
    /// Epochs fully trained
    pub epochs_completed: usize,
    /// Best value of the monitored metric observed, if any
    pub best_metric: Option<f64>,
    /// Checkpoint the next stage starts from
    pub best_checkpoint: Option<CheckpointHandle>,
    pub termination: TerminationReason,
    /// Failure message for `failed` stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl StageResult {
    /// Result of a stage that failed before its first epoch.
    pub fn failed_before_training(stage_index: i64, position: usize, failure: String) -> Self {
        Self {
            stage_index,
            position,
            epochs_completed: 0,
            best_metric: None,
            best_checkpoint: None,
            termination: TerminationReason::Failed,
            failure: Some(failure),
        }
    }
}
