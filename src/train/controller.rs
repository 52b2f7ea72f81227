//! Stage training controller
//!
//! Drives one stage as an explicit state machine (see [`ControllerState`]):
//! train an epoch, validate when scheduled, publish a checkpoint on strict
//! improvement, stop early on a plateau, and finish at `max_epochs`.

use super::collaborator::{MetricMap, Trainer, TrainingFault};
use super::early_stopping::{BestTracker, EarlyStopping};
use super::result::{StageResult, TerminationReason};
use super::signal::StopSignal;
use super::state::ControllerState;
use crate::checkpoint::{CheckpointHandle, CheckpointStore};
use crate::model::Model;
use crate::stage::StageDescriptor;
use crate::{Error, Result};

/// Outcome of running one stage
#[derive(Debug)]
pub struct StageRun<M> {
    pub result: StageResult,
    /// Model as it stood when the stage terminated
    pub model: M,
    /// Cause of a `failed` termination
    pub error: Option<Error>,
}

impl<M> StageRun<M> {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.result.termination.is_success()
    }
}

#[derive(Debug)]
struct Progress {
    state: ControllerState,
    epoch: usize,
    best_metric: Option<f64>,
    best_checkpoint: Option<CheckpointHandle>,
}

/// Runs the training loop of a single stage
#[derive(Debug, Clone, Copy)]
pub struct StageController<'a> {
    store: &'a CheckpointStore,
    stop: &'a StopSignal,
}

impl<'a> StageController<'a> {
    pub fn new(store: &'a CheckpointStore, stop: &'a StopSignal) -> Self {
        Self { store, stop }
    }

    /// Train `model` under `stage`'s policy.
    ///
    /// Never returns early: failures are reported through
    /// [`StageRun::error`] alongside a `failed` result.
    pub fn run<M, T>(
        &self,
        stage: &StageDescriptor,
        position: usize,
        mut model: M,
        trainer: &mut T,
    ) -> StageRun<M>
    where
        M: Model,
        T: Trainer<M> + ?Sized,
    {
        let policy = &stage.training_policy;
        tracing::info!(
            stage = stage.index,
            position,
            max_epochs = policy.max_epochs,
            skip_validation = policy.skip_validation,
            "stage started"
        );

        let mut progress = Progress {
            state: ControllerState::Running,
            epoch: 0,
            best_metric: None,
            best_checkpoint: None,
        };

        let error = self.drive(stage, &mut model, trainer, &mut progress).err();
        if error.is_some() {
            progress.state = ControllerState::Failed;
        }

        let termination = match progress.state {
            ControllerState::Completed if policy.skip_validation => {
                TerminationReason::ValidationSkipped
            }
            ControllerState::Completed => TerminationReason::MaxEpochsReached,
            ControllerState::EarlyStopped => TerminationReason::EarlyStopped,
            ControllerState::Cancelled => TerminationReason::Cancelled,
            _ => TerminationReason::Failed,
        };

        match &error {
            None => tracing::info!(
                stage = stage.index,
                epochs = progress.epoch,
                best_metric = ?progress.best_metric,
                %termination,
                "stage finished"
            ),
            Some(err) => tracing::error!(
                stage = stage.index,
                epochs = progress.epoch,
                error = %err,
                "stage failed"
            ),
        }

        StageRun {
            result: StageResult {
                stage_index: stage.index,
                position,
                epochs_completed: progress.epoch,
                best_metric: progress.best_metric,
                best_checkpoint: progress.best_checkpoint,
                termination,
                failure: error.as_ref().map(ToString::to_string),
            },
            model,
            error,
        }
    }

    fn drive<M, T>(
        &self,
        stage: &StageDescriptor,
        model: &mut M,
        trainer: &mut T,
        progress: &mut Progress,
    ) -> Result<()>
    where
        M: Model,
        T: Trainer<M> + ?Sized,
    {
        let policy = &stage.training_policy;
        let mut early_stopping = policy.early_stopping.as_ref().map(EarlyStopping::new);
        let mut tracker = policy.checkpoint.as_ref().map(BestTracker::new);

        trainer
            .begin_stage(stage)
            .map_err(|fault| training_failure(0, fault))?;

        loop {
            if progress.epoch >= policy.max_epochs {
                transition(stage.index, progress, ControllerState::Completed);
                break;
            }
            if self.stop.is_stopped() {
                transition(stage.index, progress, ControllerState::Cancelled);
                break;
            }

            trainer
                .train_one_epoch(model)
                .map_err(|fault| training_failure(progress.epoch + 1, fault))?;
            progress.epoch += 1;
            let epoch = progress.epoch;
            tracing::debug!(stage = stage.index, epoch, "epoch trained");

            if !policy.validates_at(epoch) {
                continue;
            }

            transition(stage.index, progress, ControllerState::Validating);
            let metrics = trainer
                .evaluate(model)
                .map_err(|fault| training_failure(epoch, fault))?;

            // Read every monitored value before acting, so a bad metric
            // fails the epoch without publishing anything.
            let ckpt_value = tracker
                .as_ref()
                .map(|t| monitored(&metrics, t.monitor(), epoch))
                .transpose()?;
            let stop_value = early_stopping
                .as_ref()
                .map(|es| monitored(&metrics, es.monitor(), epoch))
                .transpose()?;
            tracing::debug!(stage = stage.index, epoch, ?metrics, "validation finished");

            if let (Some(tracker), Some(value)) = (tracker.as_mut(), ckpt_value) {
                if tracker.offer(value) {
                    let handle = self.store.save(stage.index, model, Some(value), epoch)?;
                    progress.best_metric = Some(value);
                    progress.best_checkpoint = Some(handle);
                }
            }

            if let (Some(es), Some(value)) = (early_stopping.as_mut(), stop_value) {
                if es.observe(value) {
                    tracing::info!(
                        stage = stage.index,
                        epoch,
                        monitor = es.monitor(),
                        best = ?es.best(),
                        "early stopping: no improvement for {} validation events",
                        es.events_without_improvement()
                    );
                    transition(stage.index, progress, ControllerState::EarlyStopped);
                    break;
                }
            }

            transition(stage.index, progress, ControllerState::Running);
        }

        // A stage that published nothing hands off its terminal model.
        if progress.best_checkpoint.is_none()
            && matches!(
                progress.state,
                ControllerState::Completed | ControllerState::EarlyStopped
            )
        {
            let handle = self.store.save(stage.index, model, None, progress.epoch)?;
            progress.best_checkpoint = Some(handle);
            progress.best_metric = progress
                .best_metric
                .or_else(|| early_stopping.as_ref().and_then(EarlyStopping::best));
        }

        Ok(())
    }
}

fn transition(stage: i64, progress: &mut Progress, next: ControllerState) {
    if progress.state != next {
        tracing::trace!(
            stage,
            from = progress.state.display_name(),
            to = next.display_name(),
            "state transition"
        );
        progress.state = next;
    }
}

fn training_failure(epoch: usize, fault: TrainingFault) -> Error {
    Error::TrainingFailure {
        epoch,
        message: fault.0,
    }
}

/// Value of a monitored metric; missing or non-finite values are divergence.
fn monitored(metrics: &MetricMap, name: &str, epoch: usize) -> Result<f64> {
    match metrics.get(name) {
        Some(value) if value.is_finite() => Ok(*value),
        Some(value) => Err(Error::TrainingFailure {
            epoch,
            message: format!("monitored metric '{name}' is {value}"),
        }),
        None => Err(Error::TrainingFailure {
            epoch,
            message: format!(
                "monitored metric '{name}' missing from validation output (got: {})",
                metrics.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        }),
    }
}
