//! Aproximar: progressive model-approximation pipelines
//!
//! A pipeline is an ordered list of stages. Each stage replaces selected
//! attention sub-modules with approximations (polynomial softmax, unscaled
//! query-key product, multiplicative masking, customizable multi-head
//! blocks), retrains the model under its own policy, and hands its best
//! checkpoint to the next stage.
//!
//! # Modules
//!
//! - [`approx`]: approximation registry, parameter schemas and the applier
//! - [`model`]: the [`model::Model`] abstraction and a structural encoder
//! - [`stage`]: validated stages and training policies
//! - [`config`]: pipeline documents, validation and CLI arguments
//! - [`train`]: per-stage training controller and trainers
//! - [`checkpoint`]: content-addressed checkpoint store
//! - [`pipeline`]: the sequential driver tying it all together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aproximar::approx::ApproximationRegistry;
//! use aproximar::checkpoint::{CheckpointStore, FsBackend};
//! use aproximar::config::load_config;
//! use aproximar::model::AttentionModel;
//! use aproximar::pipeline::PipelineDriver;
//! use aproximar::train::ReplayTrainer;
//!
//! let registry = ApproximationRegistry::with_builtins();
//! let config = load_config("configs/vanilla_transformer_pipeline.json", &registry)?;
//! let store = CheckpointStore::new(Arc::new(FsBackend::new("./checkpoints")?));
//! let mut trainer = ReplayTrainer::load("configs/vanilla_transformer_metrics.json")?;
//!
//! let report = PipelineDriver::new(&registry, &store).run(
//!     &config,
//!     AttentionModel::transformer("vanilla", 2, 64, 8),
//!     &mut trainer,
//! );
//! for result in report.into_result()? {
//!     println!("stage {}: {}", result.stage_index, result.termination);
//! }
//! # Ok::<(), aproximar::Error>(())
//! ```

pub mod approx;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod stage;
pub mod train;

pub use error::{Error, Result};
