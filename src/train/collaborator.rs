//! Trainer collaborator contract
//!
//! The controller never runs numeric training itself. It drives an external
//! [`Trainer`] one epoch at a time and asks it for validation metrics.

use std::collections::BTreeMap;

use crate::stage::StageDescriptor;

/// Validation metrics by name
pub type MetricMap = BTreeMap<String, f64>;

/// Unrecoverable error reported by a trainer (divergence, device failure).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct TrainingFault(pub String);

impl TrainingFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Runs training and validation passes over a model.
pub trait Trainer<M> {
    /// Called once before the first epoch of every stage.
    fn begin_stage(&mut self, _stage: &StageDescriptor) -> Result<(), TrainingFault> {
        Ok(())
    }

    /// One full training pass.
    fn train_one_epoch(&mut self, model: &mut M) -> Result<(), TrainingFault>;

    /// One validation pass.
    fn evaluate(&mut self, model: &M) -> Result<MetricMap, TrainingFault>;
}
