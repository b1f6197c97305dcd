//! Terminal front-end for the generation workflow: the CLI counterpart of
//! the browser form.

use anyhow::{Context, Result};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tracing::Instrument;

use crate::cli::GenerateArgs;
use crate::client::ApiClient;
use crate::config::Config;
use crate::gateway::Gateways;
use crate::output::RunReport;
use crate::utils;
use crate::workflow::{PollPolicy, Script, WorkflowController, WorkflowError};

/// Run the whole wizard. Returns `None` when the user declines to submit
/// the script.
pub async fn run_generate(
    config: &Config,
    args: &GenerateArgs,
    quiet: bool,
) -> Result<Option<RunReport>> {
    let text = read_input(args).await?;
    let gateways = match &args.server {
        Some(server) => ApiClient::new(server)?.into_gateways(),
        None => Gateways::direct(config),
    };
    let controller = WorkflowController::new(gateways, PollPolicy::from(&config.workflow));

    let run_id = uuid::Uuid::new_v4();
    drive(&controller, &text, args, quiet)
        .instrument(tracing::info_span!("generate", %run_id))
        .await
}

async fn drive(
    controller: &WorkflowController,
    text: &str,
    args: &GenerateArgs,
    quiet: bool,
) -> Result<Option<RunReport>> {
    let progress = spinner(quiet, "Generating summary...");
    let summarized = controller.submit_for_summarization(text, &args.notes).await;
    progress.finish_and_clear();

    let mut script = match summarized {
        Ok(script) => script,
        Err(WorkflowError::Validation(message)) => anyhow::bail!(message),
        Err(e) => anyhow::bail!("Failed to summarize content: {}", e),
    };

    if args.edit {
        script.text = edit_in_editor(&editor_command(), &script.text)
            .await
            .context("Failed to edit script")?;
    }

    if !args.yes {
        show_script(&script)?;
        if !confirm("Generate video from this script?").await? {
            controller.reset();
            return Ok(None);
        }
    }

    let started = Instant::now();
    let submitted = script.clone();
    let job_id = match controller.confirm_script(script).await {
        Ok(job_id) => job_id,
        Err(WorkflowError::Validation(message)) => anyhow::bail!(message),
        Err(WorkflowError::Gateway(_)) => {
            return Ok(Some(RunReport {
                outcome: controller.state(),
                script: submitted,
                job: controller.job(),
                elapsed_seconds: started.elapsed().as_secs_f64(),
            }));
        }
        Err(e) => return Err(e.into()),
    };

    let progress = spinner(quiet, &format!("Your video is being generated (job {})...", job_id));
    let interval_secs = controller.policy().interval.as_secs_f64();

    let settled = controller.wait_until_settled();
    tokio::pin!(settled);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    let outcome = loop {
        tokio::select! {
            state = &mut settled => break state,
            _ = &mut ctrl_c => {
                progress.abandon_with_message("Interrupted");
                controller.reset();
                anyhow::bail!("Interrupted; stopped watching video job {}", job_id);
            }
            _ = ticker.tick() => {
                let checks = controller.job().map(|job| job.checks).unwrap_or(0);
                progress.set_message(format!(
                    "Generating video {} ({} elapsed, {} status checks every {}s)",
                    job_id,
                    utils::format_duration(started.elapsed().as_secs_f64()),
                    checks,
                    interval_secs,
                ));
            }
        }
    };
    progress.finish_and_clear();

    Ok(Some(RunReport {
        outcome,
        script: submitted,
        job: controller.job(),
        elapsed_seconds: started.elapsed().as_secs_f64(),
    }))
}

async fn read_input(args: &GenerateArgs) -> Result<String> {
    match (&args.text, &args.file) {
        (Some(text), _) if text == "-" => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read blog text from stdin")?;
            Ok(buffer)
        }
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => read_file(path),
        (None, None) => anyhow::bail!("Provide blog text with --text or --file"),
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs_err::read_to_string(path).context("Failed to read blog file")
}

fn spinner(quiet: bool, message: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

fn show_script(script: &Script) -> Result<()> {
    let term = Term::stderr();
    term.write_line(&style("Review your script").bold().to_string())?;
    term.write_line("")?;
    term.write_line(&script.text)?;
    term.write_line("")?;
    term.write_line(&format!(
        "{} words, about {} of narration",
        utils::word_count(&script.text),
        utils::format_duration(utils::estimate_narration_seconds(&script.text))
    ))?;
    Ok(())
}

async fn confirm(question: &str) -> Result<bool> {
    if !console::user_attended_stderr() {
        anyhow::bail!("Not attached to a terminal; pass --yes to submit the script without review");
    }

    let prompt = format!("{} [Y/n] ", question);
    let answer = tokio::task::spawn_blocking(move || {
        let term = Term::stderr();
        term.write_str(&prompt)?;
        term.read_line()
    })
    .await??;

    Ok(parse_yes(&answer))
}

fn parse_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes")
}

/// `$VISUAL`, then `$EDITOR`, then `vi`
fn editor_command() -> String {
    std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string())
}

/// Let the user edit `text` with `editor` and return the result
async fn edit_in_editor(editor: &str, text: &str) -> Result<String> {
    let mut parts = editor.split_whitespace();
    let program = parts.next().context("Editor command is empty")?;

    let file = tempfile::Builder::new()
        .prefix("blogcast-script-")
        .suffix(".md")
        .tempfile()
        .context("Failed to create temporary script file")?;
    fs_err::write(file.path(), text)?;

    let status = tokio::process::Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .await
        .with_context(|| format!("Failed to launch editor `{}`", editor))?;

    if !status.success() {
        anyhow::bail!("Editor exited with {}", status);
    }

    let edited = fs_err::read_to_string(file.path())?;
    tracing::debug!(preview = %utils::preview(&edited, 60), "Script edited");
    Ok(edited.trim_end().to_string())
}
