//! Validation error types
//!
//! Defines all validation error variants for pipeline documents.

/// Validation error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Pipeline has no steps (pipeline_steps must be non-empty)")]
    EmptyPipeline,

    #[error("Duplicate stage index: {0} (indices must be unique)")]
    DuplicateStageIndex(i64),

    #[error("Stage {stage}: invalid check_val_every_n_epoch 0 (must be > 0)")]
    InvalidCheckValInterval { stage: i64 },

    #[error("Stage {stage}: invalid max_epochs 0 (must be > 0)")]
    InvalidMaxEpochs { stage: i64 },

    #[error("Stage {stage}: early_stopping requires early_stopping_monitor")]
    MissingEarlyStoppingMonitor { stage: i64 },

    #[error("Stage {stage}: early_stopping requires early_stopping_patience")]
    MissingEarlyStoppingPatience { stage: i64 },

    #[error("Stage {stage}: invalid early_stopping_min_delta {value} (must be finite and >= 0.0)")]
    InvalidMinDelta { stage: i64, value: f64 },

    #[error("Stage {stage}: early_stopping cannot be combined with skip_validation")]
    EarlyStoppingWithoutValidation { stage: i64 },

    #[error("Stage {stage}: ckpt_monitor cannot be combined with skip_validation")]
    CheckpointMonitorWithoutValidation { stage: i64 },

    #[error(
        "Stage {stage}: a metric is monitored but validation never runs \
         (check_val_every_n_epoch {every} > max_epochs {max_epochs})"
    )]
    ValidationNeverRuns {
        stage: i64,
        every: usize,
        max_epochs: usize,
    },

    #[error("Stage {stage}: unrecognized module '{module}' (must be one of: {known})")]
    UnrecognizedModule {
        stage: i64,
        module: String,
        known: String,
    },
}
