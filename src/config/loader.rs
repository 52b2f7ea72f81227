//! Pipeline document loading and saving
//!
//! The format is detected from the file extension: `.yaml`/`.yml` are YAML,
//! everything else is JSON. Loading runs the full validation chain so a
//! returned [`PipelineConfig`] is ready to execute.

use std::fs;
use std::path::Path;

use super::schema::{PipelineSpec, StepSpec, TrainingArgs};
use super::validate::validate_config;
use crate::approx::{ApproximationApplier, ApproximationRegistry};
use crate::stage::PipelineConfig;
use crate::{Error, Result};

/// On-disk document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Read a pipeline document without validating it.
pub fn read_spec(path: impl AsRef<Path>) -> Result<PipelineSpec> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| Error::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_spec(&text, ConfigFormat::from_path(path))
}

/// Parse a pipeline document without validating it.
pub fn parse_spec(text: &str, format: ConfigFormat) -> Result<PipelineSpec> {
    match format {
        ConfigFormat::Json => {
            serde_json::from_str(text).map_err(|e| Error::ConfigParse(format!("JSON: {e}")))
        }
        ConfigFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| Error::ConfigParse(format!("YAML: {e}")))
        }
    }
}

/// Validate a document and resolve every approximation it names.
///
/// Unknown `(module, approximation_type)` pairs and invalid parameters are
/// reported here, before any stage runs, with the offending stage attached.
pub fn build_pipeline(spec: &PipelineSpec, registry: &ApproximationRegistry) -> Result<PipelineConfig> {
    let config = validate_config(spec, registry)?;

    let applier = ApproximationApplier::new(registry);
    for (position, stage) in config.stages().iter().enumerate() {
        applier
            .resolve_all(&stage.approximations)
            .map_err(|e| e.in_stage(stage.index, position))?;
    }

    Ok(config)
}

/// Parse and validate a pipeline document.
pub fn parse_config(
    text: &str,
    format: ConfigFormat,
    registry: &ApproximationRegistry,
) -> Result<PipelineConfig> {
    build_pipeline(&parse_spec(text, format)?, registry)
}

/// Load and validate a pipeline document from disk.
pub fn load_config(path: impl AsRef<Path>, registry: &ApproximationRegistry) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let config = build_pipeline(&read_spec(path)?, registry)?;
    tracing::debug!(path = %path.display(), stages = config.len(), "loaded pipeline config");
    Ok(config)
}

impl PipelineConfig {
    /// Document form of this pipeline.
    pub fn to_spec(&self) -> PipelineSpec {
        PipelineSpec {
            pipeline_steps: self
                .stages()
                .iter()
                .map(|stage| StepSpec {
                    index: stage.index,
                    to_approximate: stage.approximations.clone(),
                    training_args: TrainingArgs::from_policy(&stage.training_policy),
                })
                .collect(),
        }
    }
}

/// Serialize a pipeline to pretty JSON.
pub fn to_json(config: &PipelineConfig) -> Result<String> {
    serde_json::to_string_pretty(&config.to_spec())
        .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))
}

/// Save a pipeline, choosing the format from the extension.
pub fn save_config(config: &PipelineConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = match ConfigFormat::from_path(path) {
        ConfigFormat::Json => to_json(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&config.to_spec())
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?,
    };
    fs::write(path, text).map_err(|source| Error::ConfigIo {
        path: path.to_path_buf(),
        source,
    })
}
