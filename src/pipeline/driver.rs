//! Sequential pipeline driver
//!
//! Stages run strictly in order of appearance. Each stage's input model is
//! an explicit argument: the caller's model for the first stage, the previous
//! stage's best checkpoint for every later one. The hand-off goes through the
//! handle that stage returned in this run, never the store's best pointer,
//! which may be left over from an earlier run.

use crate::approx::{ApproximationApplier, ApproximationRegistry};
use crate::checkpoint::{CheckpointHandle, CheckpointStore};
use crate::model::Model;
use crate::stage::PipelineConfig;
use crate::train::{StageController, StageResult, StopSignal, TerminationReason, Trainer};
use crate::Error;

use super::report::PipelineReport;

/// Runs a [`PipelineConfig`] stage by stage
#[derive(Debug, Clone)]
pub struct PipelineDriver<'a> {
    registry: &'a ApproximationRegistry,
    store: &'a CheckpointStore,
    stop: StopSignal,
}

impl<'a> PipelineDriver<'a> {
    pub fn new(registry: &'a ApproximationRegistry, store: &'a CheckpointStore) -> Self {
        Self {
            registry,
            store,
            stop: StopSignal::new(),
        }
    }

    /// Use an externally controlled stop signal.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Run every stage, starting from `initial_model`.
    pub fn run<M, T>(&self, config: &PipelineConfig, initial_model: M, trainer: &mut T) -> PipelineReport
    where
        M: Model,
        T: Trainer<M> + ?Sized,
    {
        tracing::info!(stages = config.len(), "pipeline started");
        self.execute(config, 0, initial_model, trainer)
    }

    /// Re-run from `from_position`, seeded with the best checkpoint of the
    /// stage before it.
    pub fn resume<M, T>(&self, config: &PipelineConfig, from_position: usize, trainer: &mut T) -> PipelineReport
    where
        M: Model,
        T: Trainer<M> + ?Sized,
    {
        let seed = if from_position == 0 || from_position >= config.len() {
            Err(Error::PipelineAborted {
                position: from_position,
                reason: format!(
                    "can only resume at positions 1..{} of this pipeline",
                    config.len()
                ),
            })
        } else {
            let previous = config.stages()[from_position - 1].index;
            self.seed_from(previous, from_position)
        };

        match seed {
            Ok(model) => {
                tracing::info!(from_position, stages = config.len(), "pipeline resumed");
                self.execute(config, from_position, model, trainer)
            }
            Err(err) => PipelineReport {
                results: Vec::new(),
                failure: Some(err),
            },
        }
    }

    fn execute<M, T>(
        &self,
        config: &PipelineConfig,
        start: usize,
        seed: M,
        trainer: &mut T,
    ) -> PipelineReport
    where
        M: Model,
        T: Trainer<M> + ?Sized,
    {
        let applier = ApproximationApplier::new(self.registry);
        let controller = StageController::new(self.store, &self.stop);
        let mut report = PipelineReport::default();
        let mut seed = Some(seed);
        let mut handoff: Option<CheckpointHandle> = None;

        for (position, stage) in config.stages().iter().enumerate().skip(start) {
            let mut model = match seed.take() {
                Some(model) => model,
                None => {
                    let previous = config.stages()[position - 1].index;
                    match self.seed_from_handle(handoff.take(), previous, position) {
                        Ok(model) => model,
                        Err(err) => {
                            report.failure = Some(err);
                            break;
                        }
                    }
                }
            };

            match applier.apply(&mut model, &stage.approximations) {
                Ok(applied) => tracing::info!(
                    stage = stage.index,
                    position,
                    modules = applied.installed.len(),
                    overridden = applied.overridden.len(),
                    "approximations applied"
                ),
                Err(err) => {
                    let err = err.in_stage(stage.index, position);
                    tracing::error!(error = %err, "approximation failed");
                    report.results.push(StageResult::failed_before_training(
                        stage.index,
                        position,
                        err.to_string(),
                    ));
                    report.failure = Some(err);
                    break;
                }
            }

            let run = controller.run(stage, position, model, trainer);
            let termination = run.result.termination;
            handoff = run.result.best_checkpoint.clone();
            report.results.push(run.result);

            if let Some(err) = run.error {
                report.failure = Some(err.in_stage(stage.index, position));
                break;
            }
            if termination == TerminationReason::Cancelled {
                tracing::warn!(stage = stage.index, position, "pipeline cancelled");
                report.failure = Some(Error::Cancelled.in_stage(stage.index, position));
                break;
            }
        }

        if report.is_success() {
            tracing::info!(stages = report.results.len(), "pipeline finished");
        }
        report
    }

    /// Load the checkpoint the previous stage returned in this run.
    fn seed_from_handle<M: Model>(
        &self,
        handle: Option<CheckpointHandle>,
        previous_index: i64,
        position: usize,
    ) -> crate::Result<M> {
        let handle = handle.ok_or_else(|| Error::PipelineAborted {
            position,
            reason: format!("stage {previous_index} published no checkpoint in this run"),
        })?;
        tracing::debug!(stage = previous_index, key = %handle.key, epoch = handle.epoch, "handing off checkpoint");
        self.store
            .load(&handle)
            .map_err(|err| Error::PipelineAborted {
                position,
                reason: format!("checkpoint from stage {previous_index} is unusable: {err}"),
            })
    }

    /// Load the stored best of a stage that ran in an earlier invocation.
    fn seed_from<M: Model>(&self, previous_index: i64, position: usize) -> crate::Result<M> {
        self.store
            .load_best(previous_index)
            .map_err(|err| Error::PipelineAborted {
                position,
                reason: format!("no usable checkpoint from stage {previous_index}: {err}"),
            })
    }
}
