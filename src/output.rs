//! # Run Summary
//!
//! Renders the end-of-run summary: one line per target plus a totals line.
//! Colors follow `--color`; in `auto` mode the usual conventions apply
//! (`NO_COLOR`, `CLICOLOR=0`, `CLICOLOR_FORCE`, `TERM=dumb`) before falling
//! back to whether stdout is a color terminal.

use std::env;

use clap::ValueEnum;
use console::style;

use crate::pipeline::{RunReport, Stage, TargetOutcome};

/// Value of `--color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// How the summary is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    pub fn new(choice: ColorChoice) -> Self {
        let use_color = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => color_override(|name| {
                env::var_os(name).map(|v| v.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| console::Term::stdout().features().colors_supported()),
        };
        Self { use_color }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }
}

/// Decision forced by the environment in `auto` mode, if any.
fn color_override(var: impl Fn(&str) -> Option<String>) -> Option<bool> {
    // NO_COLOR counts even when empty.
    if var("NO_COLOR").is_some() || var("CLICOLOR").as_deref() == Some("0") {
        return Some(false);
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return Some(true);
    }
    if var("TERM").as_deref() == Some("dumb") {
        return Some(false);
    }
    None
}

/// Returns the symbol when colors are enabled, the plain text otherwise.
pub fn symbol<'a>(config: &OutputConfig, symbol: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        symbol
    } else {
        plain
    }
}

/// One summary line for a target.
pub fn outcome_line(config: &OutputConfig, outcome: &TargetOutcome) -> String {
    let version = outcome.version.as_deref().unwrap_or("-");

    let (mark, detail) = match outcome.stage {
        Stage::Failed => (
            symbol(config, "✗", "[FAIL]"),
            format!(
                "failed at {}: {}",
                outcome.failed_step.unwrap_or("unknown"),
                outcome.error.as_deref().unwrap_or_default()
            ),
        ),
        Stage::UpToDate => (symbol(config, "✓", "[OK]"), format!("already on {}", version)),
        Stage::Committed => (
            symbol(config, "✓", "[OK]"),
            format!("committed {} (not pushed)", version),
        ),
        stage => (symbol(config, "✓", "[OK]"), format!("{} {}", stage, version)),
    };

    if !config.use_color {
        return format!("{} {} {}", mark, outcome.identifier, detail);
    }

    let mark = if outcome.is_success() {
        style(mark).green().to_string()
    } else {
        style(mark).red().to_string()
    };
    format!("{} {} {}", mark, style(&outcome.identifier).bold(), detail)
}

/// Summary of a whole run, one line per target plus a totals line.
pub fn render_summary(config: &OutputConfig, report: &RunReport) -> String {
    let mut lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|outcome| outcome_line(config, outcome))
        .collect();

    let failed = report.failures().count();
    lines.push(format!(
        "{} of {} targets succeeded, {} failed",
        report.outcomes.len() - failed,
        report.outcomes.len(),
        failed
    ));

    lines.join("\n")
}
