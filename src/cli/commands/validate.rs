//! Validate command implementation

use crate::approx::ApproximationRegistry;
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, ValidateArgs};
use crate::stage::{StageDescriptor, TrainingPolicy};

use super::describe_error;

/// Format the training policy of a stage as a string
pub fn format_policy(policy: &TrainingPolicy) -> String {
    let mut lines = vec![format!("    Max epochs: {}", policy.max_epochs)];
    if policy.skip_validation {
        lines.push("    Validation: skipped".to_string());
    } else {
        lines.push(format!(
            "    Validation: every {} epoch(s)",
            policy.check_val_every_n_epoch
        ));
    }
    if let Some(es) = &policy.early_stopping {
        lines.push(format!(
            "    Early stopping: {} ({}, patience {}, min_delta {})",
            es.monitor, es.mode, es.patience, es.min_delta
        ));
    }
    if let Some(ckpt) = &policy.checkpoint {
        lines.push(format!("    Checkpoint on: {} ({})", ckpt.monitor, ckpt.mode));
    }
    lines.join("\n")
}

/// Format one stage as a string
pub fn format_stage(position: usize, stage: &StageDescriptor) -> String {
    let mut lines = vec![format!("  [{position}] stage {}", stage.index)];
    if stage.approximations.is_empty() {
        lines.push("    Approximations: none".to_string());
    }
    for spec in &stage.approximations {
        let params: Vec<String> = spec
            .parameters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        lines.push(format!("    Approximate {} {{{}}}", spec.label(), params.join(", ")));
    }
    lines.push(format_policy(&stage.training_policy));
    lines.join("\n")
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let registry = ApproximationRegistry::with_builtins();
    let config = load_config(&args.config, &registry)
        .map_err(|e| describe_error("Validation failed", &e))?;

    log(
        level,
        LogLevel::Normal,
        &format!("Configuration is valid ({} stages)", config.len()),
    );

    if args.detailed {
        println!();
        println!("Pipeline Summary:");
        for (position, stage) in config.stages().iter().enumerate() {
            println!("{}", format_stage(position, stage));
        }
    }

    Ok(())
}
