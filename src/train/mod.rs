//! Per-stage training control
//!
//! This module provides:
//! - The [`Trainer`] collaborator contract (one epoch, one validation pass)
//! - [`StageController`], the stage state machine with early stopping and
//!   best-checkpoint selection
//! - [`ReplayTrainer`], a trainer replaying recorded metrics
//! - [`StopSignal`] for cooperative cancellation at epoch boundaries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aproximar::checkpoint::{CheckpointStore, MemoryBackend};
//! use aproximar::model::AttentionModel;
//! use aproximar::stage::{StageDescriptor, TrainingPolicy};
//! use aproximar::train::{ReplayTrainer, StageController, StopSignal};
//!
//! let store = CheckpointStore::new(Arc::new(MemoryBackend::new()));
//! let stop = StopSignal::new();
//! let stage = StageDescriptor {
//!     index: 1,
//!     approximations: vec![],
//!     training_policy: TrainingPolicy::fixed_epochs(10),
//! };
//! let mut trainer = ReplayTrainer::default().with_metric_series(1, "val_loss", &[0.9, 0.7]);
//!
//! let run = StageController::new(&store, &stop).run(
//!     &stage,
//!     0,
//!     AttentionModel::transformer("vanilla", 2, 64, 8),
//!     &mut trainer,
//! );
//! println!("{:?}", run.result.termination);
//! ```

mod collaborator;
mod controller;
mod early_stopping;
mod replay;
mod result;
mod signal;
mod state;


pub use collaborator::{MetricMap, Trainer, TrainingFault};
pub use controller::{StageController, StageRun};
pub use early_stopping::{BestTracker, EarlyStopping};
pub use replay::{MetricTrace, ReplayTrainer};
pub use result::{StageResult, TerminationReason};
pub use signal::StopSignal;
pub use state::ControllerState;
