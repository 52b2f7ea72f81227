//! Inspect command implementation

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::checkpoint::{CheckpointHandle, CheckpointStore, FsBackend};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{InspectArgs, OutputFormat};
use crate::model::AttentionModel;

use super::{describe_error, render};

/// Published state of one stage
#[derive(Debug, Serialize)]
struct StageEntry {
    stage_index: i64,
    best: CheckpointHandle,
    payloads: Vec<String>,
    /// Approximated modules of the best model, `name -> approximation_type`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    approximated: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    latest: Option<CheckpointHandle>,
    stages: Vec<StageEntry>,
}

fn open_store(dir: &Path) -> Result<CheckpointStore, String> {
    if !dir.is_dir() {
        return Err(format!("Checkpoint directory not found: {}", dir.display()));
    }
    let backend =
        FsBackend::new(dir).map_err(|e| describe_error("Checkpoint directory error", &e))?;
    Ok(CheckpointStore::new(Arc::new(backend)))
}

fn collect(store: &CheckpointStore, only: Option<i64>, load_models: bool) -> Result<InspectReport, String> {
    let stages = store
        .stages()
        .map_err(|e| describe_error("Listing failed", &e))?;

    let mut entries = Vec::new();
    for stage_index in stages.into_iter().filter(|s| only.is_none_or(|o| o == *s)) {
        let Some(best) = store
            .best_handle(stage_index)
            .map_err(|e| describe_error("Checkpoint error", &e))?
        else {
            continue;
        };
        let payloads = store
            .payloads(stage_index)
            .map_err(|e| describe_error("Listing failed", &e))?;

        let approximated = if load_models {
            // Loading verifies the payload digest
            let model: AttentionModel = store
                .load(&best)
                .map_err(|e| describe_error("Checkpoint error", &e))?;
            model
                .modules()
                .iter()
                .filter(|(_, slot)| slot.is_approximated())
                .map(|(name, slot)| (name.clone(), slot.approximation.clone()))
                .collect()
        } else {
            Vec::new()
        };

        entries.push(StageEntry {
            stage_index,
            best,
            payloads,
            approximated,
        });
    }

    Ok(InspectReport {
        latest: store
            .latest_handle()
            .map_err(|e| describe_error("Checkpoint error", &e))?,
        stages: entries,
    })
}

/// Format one stage entry as a string
fn format_entry(entry: &StageEntry) -> String {
    let metric = entry
        .best
        .metric
        .map_or_else(|| "-".to_string(), |m| format!("{m:.6}"));
    let mut lines = vec![
        format!("  Stage {}:", entry.stage_index),
        format!("    Best: {} (epoch {}, metric {metric})", entry.best.key, entry.best.epoch),
        format!(
            "    Saved: {}  Size: {} bytes  SHA-256: {}",
            entry.best.timestamp.to_rfc3339(),
            entry.best.size_bytes,
            entry.best.digest
        ),
        format!("    Payloads on disk: {}", entry.payloads.len()),
    ];
    for (name, approximation) in &entry.approximated {
        lines.push(format!("    {name}: {approximation}"));
    }
    lines.join("\n")
}

pub fn run_inspect(args: InspectArgs, level: LogLevel) -> Result<(), String> {
    let store = open_store(&args.checkpoints)?;
    let report = collect(&store, args.stage, level == LogLevel::Verbose)?;

    if let Some(stage) = args.stage {
        if report.stages.is_empty() {
            return Err(format!("No checkpoint published for stage {stage}"));
        }
    }

    match args.format {
        OutputFormat::Text => {
            log(
                level,
                LogLevel::Normal,
                &format!("Checkpoints in {}:", args.checkpoints.display()),
            );
            for entry in &report.stages {
                log(level, LogLevel::Normal, &format_entry(entry));
            }
            if let Some(latest) = &report.latest {
                log(
                    level,
                    LogLevel::Normal,
                    &format!("Latest: stage {} ({})", latest.stage_index, latest.key),
                );
            }
        }
        format => println!("{}", render(&report, format)?),
    }

    Ok(())
}
