//! Configuration validation logic
//!
//! Turns a raw [`PipelineSpec`] into a [`PipelineConfig`], checking:
//! - the pipeline is non-empty and stage indices are unique
//! - numeric training arguments are in range
//! - monitored metrics can actually be observed
//! - every module named by an approximation is known to the registry

use std::collections::BTreeSet;

use super::error::ValidationError;
use crate::approx::ApproximationRegistry;
use crate::config::schema::{PipelineSpec, TrainingArgs};
use crate::stage::{
    CheckpointPolicy, EarlyStoppingPolicy, PipelineConfig, StageDescriptor, TrainingPolicy,
};

/// Validate a pipeline document
pub fn validate_config(
    spec: &PipelineSpec,
    registry: &ApproximationRegistry,
) -> Result<PipelineConfig, ValidationError> {
    if spec.pipeline_steps.is_empty() {
        return Err(ValidationError::EmptyPipeline);
    }

    let mut seen = BTreeSet::new();
    let mut stages = Vec::with_capacity(spec.pipeline_steps.len());

    for step in &spec.pipeline_steps {
        if !seen.insert(step.index) {
            return Err(ValidationError::DuplicateStageIndex(step.index));
        }

        for approximation in &step.to_approximate {
            if !registry.knows_module(&approximation.module) {
                let known: Vec<String> = registry.modules().iter().map(|m| m.to_string()).collect();
                return Err(ValidationError::UnrecognizedModule {
                    stage: step.index,
                    module: approximation.module.to_string(),
                    known: known.join(", "),
                });
            }
        }

        stages.push(StageDescriptor {
            index: step.index,
            approximations: step.to_approximate.clone(),
            training_policy: validate_training_args(step.index, &step.training_args)?,
        });
    }

    Ok(PipelineConfig::from_validated(stages))
}

/// Validate the `training_args` of stage `stage`
pub fn validate_training_args(
    stage: i64,
    args: &TrainingArgs,
) -> Result<TrainingPolicy, ValidationError> {
    if args.max_epochs == 0 {
        return Err(ValidationError::InvalidMaxEpochs { stage });
    }
    if args.check_val_every_n_epoch == 0 {
        return Err(ValidationError::InvalidCheckValInterval { stage });
    }

    let early_stopping = if args.early_stopping {
        if args.skip_validation {
            return Err(ValidationError::EarlyStoppingWithoutValidation { stage });
        }
        let monitor = args
            .early_stopping_monitor
            .clone()
            .ok_or(ValidationError::MissingEarlyStoppingMonitor { stage })?;
        let patience = args
            .early_stopping_patience
            .ok_or(ValidationError::MissingEarlyStoppingPatience { stage })?;
        let min_delta = args.early_stopping_min_delta.unwrap_or(0.0);
        if !min_delta.is_finite() || min_delta < 0.0 {
            return Err(ValidationError::InvalidMinDelta {
                stage,
                value: min_delta,
            });
        }
        Some(EarlyStoppingPolicy {
            monitor,
            mode: args.early_stopping_mode.unwrap_or_default(),
            patience,
            min_delta,
        })
    } else {
        None
    };

    let checkpoint = match &args.ckpt_monitor {
        Some(_) if args.skip_validation => {
            return Err(ValidationError::CheckpointMonitorWithoutValidation { stage });
        }
        Some(monitor) => Some(CheckpointPolicy {
            monitor: monitor.clone(),
            mode: args.ckpt_mode.unwrap_or_default(),
        }),
        None => None,
    };

    if (early_stopping.is_some() || checkpoint.is_some())
        && args.check_val_every_n_epoch > args.max_epochs
    {
        return Err(ValidationError::ValidationNeverRuns {
            stage,
            every: args.check_val_every_n_epoch,
            max_epochs: args.max_epochs,
        });
    }

    if args.early_stopping_patience_reached == Some(true) {
        tracing::debug!(stage, "ignoring early_stopping_patience_reached");
    }

    Ok(TrainingPolicy {
        skip_validation: args.skip_validation,
        check_val_every_n_epoch: args.check_val_every_n_epoch,
        early_stopping,
        checkpoint,
        max_epochs: args.max_epochs,
    })
}
