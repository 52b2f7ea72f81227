//! Pipeline configuration
//!
//! - [`schema`]: the document layout (`pipeline_steps`, `training_args`)
//! - [`validate`]: consistency rules turning a document into a pipeline
//! - loading/saving JSON and YAML documents
//! - [`cli`]: command-line arguments

pub mod cli;
mod loader;
pub mod schema;
pub mod validate;

pub use cli::{
    parse_args, Cli, Command, InfoArgs, InspectArgs, OutputFormat, RunArgs, ValidateArgs,
};
pub use loader::{
    build_pipeline, load_config, parse_config, parse_spec, read_spec, save_config, to_json,
    ConfigFormat,
};
pub use schema::{PipelineSpec, StepSpec, TrainingArgs};
pub use validate::{validate_config, validate_training_args, ValidationError};
