//! Info command implementation

use serde::Serialize;

use crate::approx::{ApproximationInfo, ApproximationRegistry, ParamValue};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, InfoArgs, OutputFormat};

use super::validate::format_stage;
use super::{describe_error, render};

#[derive(Debug, Serialize)]
struct ParamRow<'a> {
    name: &'a str,
    kind: String,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<&'a ParamValue>,
}

#[derive(Debug, Serialize)]
struct ApproximationRow<'a> {
    module: String,
    approximation_type: &'a str,
    trainable: bool,
    parameters: Vec<ParamRow<'a>>,
}

impl<'a> From<ApproximationInfo<'a>> for ApproximationRow<'a> {
    fn from(info: ApproximationInfo<'a>) -> Self {
        Self {
            module: info.module.to_string(),
            approximation_type: info.approximation_type,
            trainable: info.trainable,
            parameters: info
                .schema
                .params()
                .iter()
                .map(|p| ParamRow {
                    name: &p.name,
                    kind: p.kind.describe(),
                    required: p.required,
                    default: p.default.as_ref(),
                })
                .collect(),
        }
    }
}

/// Format one registered approximation as a string
fn format_approximation(row: &ApproximationRow<'_>) -> String {
    let mut lines = vec![format!(
        "  {}/{}{}",
        row.module,
        row.approximation_type,
        if row.trainable { " (trainable)" } else { "" }
    )];
    for param in &row.parameters {
        let mut line = format!("    {}: {}", param.name, param.kind);
        if param.required {
            line.push_str(", required");
        }
        if let Some(default) = param.default {
            line.push_str(&format!(", default {default}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let registry = ApproximationRegistry::with_builtins();

    let Some(path) = args.config else {
        let rows: Vec<ApproximationRow<'_>> = registry.entries().map(Into::into).collect();
        match args.format {
            OutputFormat::Text => {
                log(level, LogLevel::Normal, "Registered approximations:");
                for row in &rows {
                    println!("{}", format_approximation(row));
                }
            }
            format => println!("{}", render(&rows, format)?),
        }
        return Ok(());
    };

    let config =
        load_config(&path, &registry).map_err(|e| describe_error("Config error", &e))?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Pipeline Info:");
            println!();
            println!("Stages: {}", config.len());
            for (position, stage) in config.stages().iter().enumerate() {
                println!("{}", format_stage(position, stage));
            }
        }
        format => println!("{}", render(&config.to_spec(), format)?),
    }

    Ok(())
}
