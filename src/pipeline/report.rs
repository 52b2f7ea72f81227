//! Pipeline run report

use serde::Serialize;

use crate::checkpoint::CheckpointHandle;
use crate::train::{StageResult, TerminationReason};
use crate::{Error, Result};

/// Stage results in execution order, plus the cause of a halt
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub results: Vec<StageResult>,
    /// Why the pipeline halted; `None` when every stage succeeded
    pub failure: Option<Error>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Checkpoint produced by the last stage that ran.
    pub fn final_checkpoint(&self) -> Option<&CheckpointHandle> {
        self.results.last().and_then(|r| r.best_checkpoint.as_ref())
    }

    /// Results of stages that terminated with the given reason.
    pub fn with_termination(&self, reason: TerminationReason) -> impl Iterator<Item = &StageResult> {
        self.results.iter().filter(move |r| r.termination == reason)
    }

    /// Discard partial results on failure.
    pub fn into_result(self) -> Result<Vec<StageResult>> {
        match self.failure {
            None => Ok(self.results),
            Some(err) => Err(err),
        }
    }

    /// Serializable view for CLI output.
    pub fn summary(&self) -> ReportSummary<'_> {
        ReportSummary {
            success: self.is_success(),
            stages: &self.results,
            error_code: self.failure.as_ref().map(Error::code),
            failure: self.failure.as_ref().map(ToString::to_string),
        }
    }
}

/// JSON/YAML shape of a [`PipelineReport`]
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub success: bool,
    pub stages: &'a [StageResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}
