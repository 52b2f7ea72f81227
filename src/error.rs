//! Error types with actionable diagnostics (Andon principle).
//!
//! Every fatal condition in the pipeline surfaces through [`Error`] with
//! enough context (stage index, offending spec) to fix the configuration
//! without re-running earlier stages.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ValidationError;

/// Result type alias for aproximar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, applying or training a pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read.
    #[error("Failed to read config {path}: {source}\n  → Check the path passed to the command")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file has invalid syntax or shape.
    #[error("Failed to parse pipeline config: {0}\n  → Check JSON/YAML syntax and the `pipeline_steps` layout")]
    ConfigParse(String),

    /// Configuration is well-formed but inconsistent.
    #[error("Invalid pipeline config: {0}")]
    ConfigValidation(#[from] ValidationError),

    /// No approximation registered for the `(module, approximation_type)` pair.
    #[error("Unknown approximation '{approximation_type}' for module '{module}'\n  → Registered approximations are listed by `aproximar info`")]
    UnknownApproximation {
        module: String,
        approximation_type: String,
    },

    /// Approximation parameters do not satisfy the registered schema.
    #[error("Invalid parameter '{parameter}' for {module}/{approximation_type}: {reason}")]
    InvalidParameter {
        module: String,
        approximation_type: String,
        parameter: String,
        reason: String,
    },

    /// The approximation could not be installed on the model.
    #[error("Cannot approximate module '{module}': {reason}")]
    Application { module: String, reason: String },

    /// The training or validation collaborator failed.
    #[error("Training failed at epoch {epoch}: {message}")]
    TrainingFailure { epoch: usize, message: String },

    /// No usable checkpoint exists to seed the next stage.
    #[error("Pipeline aborted before stage at position {position}: {reason}")]
    PipelineAborted { position: usize, reason: String },

    /// Storage backend I/O failure.
    #[error("Storage error on '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint missing, corrupted or inconsistent.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Pipeline stopped by an external stop signal.
    #[error("Pipeline cancelled at an epoch boundary")]
    Cancelled,

    /// Error raised while processing a specific stage.
    #[error("stage {stage_index} (position {position}): {source}")]
    InStage {
        stage_index: i64,
        position: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach stage context to an error.
    pub fn in_stage(self, stage_index: i64, position: usize) -> Self {
        match self {
            already @ Self::InStage { .. } => already,
            other => Self::InStage {
                stage_index,
                position,
                source: Box::new(other),
            },
        }
    }

    /// Strip stage context and return the underlying error.
    pub fn root(&self) -> &Error {
        match self {
            Self::InStage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error is fixable by editing the configuration.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.root(),
            Self::ConfigIo { .. }
                | Self::ConfigParse(_)
                | Self::ConfigValidation(_)
                | Self::UnknownApproximation { .. }
                | Self::InvalidParameter { .. }
                | Self::Application { .. }
                | Self::Cancelled
        )
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InStage { source, .. } => source.code(),
            Self::ConfigIo { .. } => "E001",
            Self::ConfigParse(_) => "E002",
            Self::ConfigValidation(_) => "E003",
            Self::UnknownApproximation { .. } => "E010",
            Self::InvalidParameter { .. } => "E011",
            Self::Application { .. } => "E012",
            Self::TrainingFailure { .. } => "E020",
            Self::PipelineAborted { .. } => "E021",
            Self::Storage { .. } => "E030",
            Self::Checkpoint(_) => "E031",
            Self::Serialization(_) => "E040",
            Self::Cancelled => "E060",
        }
    }
}
