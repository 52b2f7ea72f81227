//! Run command implementation

use std::path::Path;
use std::sync::Arc;

use crate::approx::ApproximationRegistry;
use crate::checkpoint::{CheckpointStore, FsBackend};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, OutputFormat, RunArgs};
use crate::model::{AttentionModel, Model};
use crate::pipeline::{PipelineDriver, PipelineReport};
use crate::train::{ReplayTrainer, StageResult};

use super::{describe_error, render};

/// Format one stage result as a string
pub fn format_result(result: &StageResult) -> String {
    let mut line = format!(
        "  [{}] stage {}: {} after {} epoch(s)",
        result.position, result.stage_index, result.termination, result.epochs_completed
    );
    if let Some(metric) = result.best_metric {
        line.push_str(&format!(", best {metric:.6}"));
    }
    if let Some(handle) = &result.best_checkpoint {
        line.push_str(&format!(", checkpoint {} (epoch {})", handle.key, handle.epoch));
    }
    if let Some(failure) = &result.failure {
        line.push_str(&format!("\n      {failure}"));
    }
    line
}

fn initial_model(args: &RunArgs) -> Result<AttentionModel, String> {
    match &args.model {
        Some(path) => read_model(path),
        None => Ok(AttentionModel::transformer(
            "vanilla",
            args.layers,
            args.embed_dim,
            args.num_heads,
        )),
    }
}

fn read_model(path: &Path) -> Result<AttentionModel, String> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Failed to read model {}: {e}", path.display()))?;
    AttentionModel::decode(&bytes).map_err(|e| describe_error("Model error", &e))
}

fn print_report(report: &PipelineReport, format: OutputFormat, level: LogLevel) -> Result<(), String> {
    match format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Stage results:");
            for result in &report.results {
                log(level, LogLevel::Normal, &format_result(result));
            }
        }
        format => println!("{}", render(&report.summary(), format)?),
    }
    Ok(())
}

pub fn run_pipeline(args: RunArgs, level: LogLevel) -> Result<(), String> {
    let registry = ApproximationRegistry::with_builtins();
    let config = load_config(&args.config, &registry)
        .map_err(|e| describe_error("Config error", &e))?;
    let mut trainer =
        ReplayTrainer::load(&args.trace).map_err(|e| describe_error("Trace error", &e))?;

    let backend = FsBackend::new(&args.output_dir)
        .map_err(|e| describe_error("Checkpoint directory error", &e))?;
    let store = CheckpointStore::new(Arc::new(backend)).with_retain_all(!args.prune_superseded);
    let driver = PipelineDriver::new(&registry, &store);

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Running {} stage(s) from {}",
            config.len(),
            args.config.display()
        ),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!("  Checkpoints: {}", args.output_dir.display()),
    );

    let report = match args.resume_from {
        Some(position) => {
            if args.model.is_some() {
                tracing::warn!("--model is ignored when resuming");
            }
            log(
                level,
                LogLevel::Normal,
                &format!("Resuming at position {position}"),
            );
            driver.resume::<AttentionModel, _>(&config, position, &mut trainer)
        }
        None => driver.run(&config, initial_model(&args)?, &mut trainer),
    };

    print_report(&report, args.format, level)?;

    match &report.failure {
        None => {
            if let Some(handle) = report.final_checkpoint() {
                log(
                    level,
                    LogLevel::Normal,
                    &format!("Final model: {}", handle.key),
                );
            }
            Ok(())
        }
        Some(err) => Err(describe_error("Pipeline failed", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::TerminationReason;

    #[test]
    fn test_format_result_failed() {
        let result = StageResult::failed_before_training(4, 2, "no softmax".into());
        let line = format_result(&result);
        assert!(line.contains("[2] stage 4: failed after 0 epoch(s)"));
        assert!(line.contains("no softmax"));
    }

    #[test]
    fn test_format_result_metric() {
        let result = StageResult {
            best_metric: Some(0.25),
            termination: TerminationReason::EarlyStopped,
            failure: None,
            ..StageResult::failed_before_training(1, 0, String::new())
        };
        let line = format_result(&result);
        assert!(line.contains("early_stopped"));
        assert!(line.contains("best 0.250000"));
    }

    #[test]
    fn test_initial_model_from_flags() {
        let args = RunArgs {
            config: "p.json".into(),
            trace: "m.json".into(),
            output_dir: "out".into(),
            model: None,
            layers: 3,
            embed_dim: 32,
            num_heads: 4,
            resume_from: None,
            prune_superseded: false,
            format: OutputFormat::Text,
        };
        let model = initial_model(&args).unwrap();
        assert_eq!(model.modules_of_kind(&crate::approx::ModuleKind::Multihead).len(), 3);
    }
}
