//! Validated, read-only pipeline stages
//!
//! These types are only constructed by the config validator (or by tests
//! through the same invariants), so holding a [`PipelineConfig`] means the
//! pipeline is well-formed.

mod policy;

pub use policy::{CheckpointPolicy, EarlyStoppingPolicy, MonitorMode, TrainingPolicy};

use serde::{Deserialize, Serialize};

use crate::approx::{ModuleKind, Parameters};

/// One approximation to apply: which module, which approximation, how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproximationSpec {
    pub module: ModuleKind,
    pub approximation_type: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ApproximationSpec {
    pub fn new(module: impl Into<ModuleKind>, approximation_type: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            approximation_type: approximation_type.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<crate::approx::ParamValue>,
    ) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// `module/approximation_type`, for logs and reports.
    pub fn label(&self) -> String {
        format!("{}/{}", self.module, self.approximation_type)
    }
}

/// One pipeline step: ordered approximations plus a training policy.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDescriptor {
    /// Opaque label, used for reporting and checkpoint keys
    pub index: i64,
    /// Applied in order; same-module conflicts are last-write-wins
    pub approximations: Vec<ApproximationSpec>,
    pub training_policy: TrainingPolicy,
}

/// Ordered, non-empty sequence of stages with unique indices.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    stages: Vec<StageDescriptor>,
}

impl PipelineConfig {
    /// Wrap already-validated stages.
    ///
    /// Only the validator calls this; it checks non-emptiness and index
    /// uniqueness beforehand.
    pub(crate) fn from_validated(stages: Vec<StageDescriptor>) -> Self {
        Self { stages }
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a validated config.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Position of the stage labelled `index`.
    pub fn position_of(&self, index: i64) -> Option<usize> {
        self.stages.iter().position(|s| s.index == index)
    }
}
