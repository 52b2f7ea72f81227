//! Training policy of a stage and metric comparison rules

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction in which a monitored metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    Max,
    #[default]
    Min,
}

impl MonitorMode {
    /// Whether `candidate` strictly improves on `best` by more than
    /// `min_delta`. The first observation (`best == None`) always improves.
    pub fn improves(self, candidate: f64, best: Option<f64>, min_delta: f64) -> bool {
        match best {
            None => true,
            Some(best) => match self {
                MonitorMode::Max => candidate > best + min_delta,
                MonitorMode::Min => candidate < best - min_delta,
            },
        }
    }

    /// Whether `a` ranks at least as well as `b`.
    pub fn at_least_as_good(self, a: f64, b: f64) -> bool {
        match self {
            MonitorMode::Max => a >= b,
            MonitorMode::Min => a <= b,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MonitorMode::Max => "max",
            MonitorMode::Min => "min",
        }
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Early stopping settings; present only when early stopping is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStoppingPolicy {
    pub monitor: String,
    pub mode: MonitorMode,
    /// Non-improving validation events tolerated before stopping
    pub patience: usize,
    /// Minimum change that counts as an improvement
    pub min_delta: f64,
}

/// Checkpoint-by-metric settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointPolicy {
    pub monitor: String,
    pub mode: MonitorMode,
}

/// Validated training policy of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPolicy {
    pub skip_validation: bool,
    /// Validate when `epoch % check_val_every_n_epoch == 0`
    pub check_val_every_n_epoch: usize,
    pub early_stopping: Option<EarlyStoppingPolicy>,
    /// `None` keeps the terminal model as the stage checkpoint
    pub checkpoint: Option<CheckpointPolicy>,
    /// Hard ceiling on epochs, even without early stopping
    pub max_epochs: usize,
}

impl TrainingPolicy {
    /// Policy that trains for `max_epochs`, validating every epoch, with no
    /// early stopping or metric-based checkpointing.
    pub fn fixed_epochs(max_epochs: usize) -> Self {
        Self {
            skip_validation: false,
            check_val_every_n_epoch: 1,
            early_stopping: None,
            checkpoint: None,
            max_epochs,
        }
    }

    /// Whether validation runs after `epoch` (1-based).
    pub fn validates_at(&self, epoch: usize) -> bool {
        !self.skip_validation && epoch.is_multiple_of(self.check_val_every_n_epoch)
    }
}
