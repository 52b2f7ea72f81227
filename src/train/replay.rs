//! Trainer that replays recorded validation metrics
//!
//! Used to dry-run a schedule: training passes are no-ops that only count
//! epochs, and each validation pass returns the next recorded metric map of
//! the current stage. When the recording runs out the last entry repeats.
//!
//! Trace layout:
//!
//! ```json
//! {
//!   "stages": { "1": [{"val_loss": 0.9}, {"val_loss": 0.7}] },
//!   "failures": { "2": 3 }
//! }
//! ```
//!
//! `failures` makes the given stage fail during the given (1-based) epoch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::collaborator::{MetricMap, Trainer, TrainingFault};
use crate::model::AttentionModel;
use crate::stage::StageDescriptor;
use crate::{Error, Result};

/// Recorded metrics, keyed by stage index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTrace {
    #[serde(default)]
    pub stages: BTreeMap<i64, Vec<MetricMap>>,
    #[serde(default)]
    pub failures: BTreeMap<i64, usize>,
}

/// Replays a [`MetricTrace`]
#[derive(Debug, Clone, Default)]
pub struct ReplayTrainer {
    trace: MetricTrace,
    current: Option<i64>,
    epoch: usize,
    cursor: usize,
}

impl ReplayTrainer {
    pub fn new(trace: MetricTrace) -> Self {
        Self {
            trace,
            ..Self::default()
        }
    }

    /// Parse a JSON trace.
    pub fn from_json(text: &str) -> Result<Self> {
        let trace = serde_json::from_str(text)
            .map_err(|e| Error::Serialization(format!("Invalid metric trace: {e}")))?;
        Ok(Self::new(trace))
    }

    /// Load a JSON trace from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Record metrics for a stage, one map per validation event.
    pub fn with_stage(mut self, stage_index: i64, events: Vec<MetricMap>) -> Self {
        self.trace.stages.insert(stage_index, events);
        self
    }

    /// Convenience: a single metric per validation event.
    pub fn with_metric_series(self, stage_index: i64, metric: &str, values: &[f64]) -> Self {
        let events = values
            .iter()
            .map(|v| MetricMap::from([(metric.to_string(), *v)]))
            .collect();
        self.with_stage(stage_index, events)
    }

    /// Make `stage_index` fail while training `epoch` (1-based).
    pub fn fail_stage_at(mut self, stage_index: i64, epoch: usize) -> Self {
        self.trace.failures.insert(stage_index, epoch);
        self
    }

    pub fn trace(&self) -> &MetricTrace {
        &self.trace
    }

    fn stage(&self) -> std::result::Result<i64, TrainingFault> {
        self.current
            .ok_or_else(|| TrainingFault::new("replay trainer used outside a stage"))
    }

    fn advance(&mut self) -> std::result::Result<(), TrainingFault> {
        let stage = self.stage()?;
        self.epoch += 1;
        if self.trace.failures.get(&stage) == Some(&self.epoch) {
            return Err(TrainingFault::new(format!(
                "recorded failure of stage {stage} at epoch {}",
                self.epoch
            )));
        }
        Ok(())
    }

    fn next_metrics(&mut self) -> std::result::Result<MetricMap, TrainingFault> {
        let stage = self.stage()?;
        let events = self
            .trace
            .stages
            .get(&stage)
            .filter(|events| !events.is_empty())
            .ok_or_else(|| TrainingFault::new(format!("no recorded metrics for stage {stage}")))?;
        let metrics = events[self.cursor.min(events.len() - 1)].clone();
        self.cursor += 1;
        Ok(metrics)
    }
}

impl Trainer<AttentionModel> for ReplayTrainer {
    fn begin_stage(&mut self, stage: &StageDescriptor) -> std::result::Result<(), TrainingFault> {
        self.current = Some(stage.index);
        self.epoch = 0;
        self.cursor = 0;
        Ok(())
    }

    fn train_one_epoch(&mut self, model: &mut AttentionModel) -> std::result::Result<(), TrainingFault> {
        self.advance()?;
        model.trained_epochs += 1;
        Ok(())
    }

    fn evaluate(&mut self, _model: &AttentionModel) -> std::result::Result<MetricMap, TrainingFault> {
        self.next_metrics()
    }
}
