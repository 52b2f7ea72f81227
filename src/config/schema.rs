//! Pipeline document schema
//!
//! Mirrors the on-disk layout one-to-one. Nothing here is validated; see
//! [`crate::config::validate_config`] for the rules that turn a document into
//! a [`crate::stage::PipelineConfig`].

use serde::{Deserialize, Serialize};

use crate::stage::{ApproximationSpec, MonitorMode, TrainingPolicy};

/// Top-level pipeline document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    pub pipeline_steps: Vec<StepSpec>,
}

/// One entry of `pipeline_steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub index: i64,
    #[serde(default)]
    pub to_approximate: Vec<ApproximationSpec>,
    pub training_args: TrainingArgs,
}

/// `training_args` block, with its literal key names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingArgs {
    #[serde(default)]
    pub skip_validation: bool,

    #[serde(default = "default_check_val_every_n_epoch")]
    pub check_val_every_n_epoch: usize,

    #[serde(default)]
    pub early_stopping: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stopping_monitor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stopping_mode: Option<MonitorMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stopping_patience: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stopping_min_delta: Option<f64>,

    /// Accepted for compatibility with existing documents; has no effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stopping_patience_reached: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ckpt_monitor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ckpt_mode: Option<MonitorMode>,

    pub max_epochs: usize,
}

fn default_check_val_every_n_epoch() -> usize {
    1
}

impl TrainingArgs {
    /// Minimal arguments: validate every epoch for `max_epochs` epochs.
    pub fn new(max_epochs: usize) -> Self {
        Self {
            skip_validation: false,
            check_val_every_n_epoch: default_check_val_every_n_epoch(),
            early_stopping: false,
            early_stopping_monitor: None,
            early_stopping_mode: None,
            early_stopping_patience: None,
            early_stopping_min_delta: None,
            early_stopping_patience_reached: None,
            ckpt_monitor: None,
            ckpt_mode: None,
            max_epochs,
        }
    }

    /// Document form of a validated policy.
    pub fn from_policy(policy: &TrainingPolicy) -> Self {
        let mut args = Self::new(policy.max_epochs);
        args.skip_validation = policy.skip_validation;
        args.check_val_every_n_epoch = policy.check_val_every_n_epoch;
        if let Some(es) = &policy.early_stopping {
            args.early_stopping = true;
            args.early_stopping_monitor = Some(es.monitor.clone());
            args.early_stopping_mode = Some(es.mode);
            args.early_stopping_patience = Some(es.patience);
            args.early_stopping_min_delta = Some(es.min_delta);
        }
        if let Some(ckpt) = &policy.checkpoint {
            args.ckpt_monitor = Some(ckpt.monitor.clone());
            args.ckpt_mode = Some(ckpt.mode);
        }
        args
    }
}
