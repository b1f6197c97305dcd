use anyhow::Result;
use console::style;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::gateway::JobStatusReport;
use crate::utils;
use crate::workflow::{Job, Script, WorkflowState};

pub const START_FAILED_PREFIX: &str = "Error starting video generation: ";
pub const POLL_FAILED_PREFIX: &str = "Polling error: ";

/// Outcome of one `generate` run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: WorkflowState,
    pub script: Script,
    pub job: Option<Job>,
    pub elapsed_seconds: f64,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, WorkflowState::VideoReady { .. })
    }

    /// The failure as the user sees it, prefixed by the stage it happened in.
    /// A failure the provider reported itself is shown as is.
    pub fn error_message(&self) -> Option<String> {
        let WorkflowState::VideoFailed { error } = &self.outcome else {
            return None;
        };

        Some(match &self.job {
            None => format!("{}{}", START_FAILED_PREFIX, error),
            Some(job) if !job.state.is_terminal() => format!("{}{}", POLL_FAILED_PREFIX, error),
            Some(_) => error.clone(),
        })
    }
}

pub fn format_as_text(report: &RunReport) -> String {
    let mut out = String::new();

    match &report.outcome {
        WorkflowState::VideoReady { video_url } => {
            out.push_str(&format!("{} {}\n", style("Your video is ready:").green().bold(), video_url));
            if let Some(host) = utils::extract_domain(video_url) {
                out.push_str(&format!("  Hosted on: {}\n", host));
            }
        }
        WorkflowState::VideoFailed { .. } => {
            let message = report.error_message().unwrap_or_default();
            out.push_str(&format!("{}\n", style(message).red().bold()));
        }
        other => {
            out.push_str(&format!("{} {}\n", style("Stopped while").yellow(), other));
        }
    }

    if let Some(job) = &report.job {
        out.push_str(&format!("  Video ID: {}\n", job.id));
        out.push_str(&format!("  Status checks: {}\n", job.checks));
    }
    out.push_str(&format!(
        "  Elapsed: {}\n",
        utils::format_duration(report.elapsed_seconds)
    ));
    out.push_str(&format!(
        "  Script: {} words (~{} of narration)",
        utils::word_count(&report.script.text),
        utils::format_duration(utils::estimate_narration_seconds(&report.script.text))
    ));

    out
}

pub fn format_as_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn format_status(report: &JobStatusReport, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let mut out = format!("Status: {}", report.status);
            if let Some(url) = &report.video_url {
                out.push_str(&format!("\nVideo URL: {}", url));
            }
            if let Some(error) = &report.error {
                out.push_str(&format!("\nError: {}", error));
            }
            Ok(out)
        }
    }
}

/// Print run report to console
pub fn print_to_console(report: &RunReport, format: &OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Text => format_as_text(report),
        OutputFormat::Json => format_as_json(report)?,
    };

    println!("{}", content);
    Ok(())
}
