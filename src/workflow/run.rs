//! The `areport run <subject>` command.
//!
//! Resolves config, builds the completion client, runs the pipeline with a
//! recorder attached, then publishes the report to stdout and the optional
//! output directory.
use crate::cli::{OutputFormat, RunArgs};
use crate::config::{resolve_config, ConfigOverrides};
use crate::extract::ExtractOutcome;
use crate::lm::{client_from_config, CompletionOptions};
use crate::output::{write_report, OutputPaths, ReportDocument};
use crate::pipeline::{validate_subject, AggregateReport, Pipeline, StepEvent, StepObserver};
use crate::prompts::StepPrompt;
use crate::run_log::{
    append_run_log, reset_run_log, store_transcript, RunLogBuilder, RunLogEntry,
};
use crate::util::display_path;
use anyhow::{Context, Result};

/// Run the full analysis for one subject.
pub fn run_run(args: &RunArgs, verbose: bool) -> Result<()> {
    // Blank subjects fail before config or client setup.
    let subject = validate_subject(&args.subject)?;

    let overrides = ConfigOverrides::from_cli_and_env(args.lm.as_deref(), args.model.as_deref());
    let config = resolve_config(args.config.as_deref(), &overrides)?;
    let client = client_from_config(&config.backend)?;
    let pipeline = Pipeline::new(client, CompletionOptions::from_config(&config));

    let paths = args.out_dir.clone().map(OutputPaths::new);
    if let Some(paths) = &paths {
        reset_run_log(paths)?;
    }
    let mut recorder = RunRecorder {
        paths: paths.clone(),
        transcripts: args.transcripts,
        verbose,
        io_error: None,
    };
    tracing::info!(subject, model = %config.model, "starting run");
    let report = pipeline.run_observed(subject, &mut recorder)?;

    if let Some(paths) = &paths {
        let written = write_report(paths, &report)?;
        if verbose {
            let cwd = std::env::current_dir().ok();
            for path in written {
                eprintln!("wrote {}", display_path(&path, cwd.as_deref()));
            }
        }
    }

    // The report is printed even when the run log could not be recorded.
    print!("{}", render_report(args.format, subject, &report)?);

    let total = report.steps().len();
    let succeeded = report.succeeded_count();
    if verbose || succeeded < total {
        eprintln!("run: {succeeded}/{total} steps succeeded");
    }
    if let Some(err) = recorder.io_error {
        return Err(err.context("record run log"));
    }
    Ok(())
}

fn render_report(format: OutputFormat, subject: &str, report: &AggregateReport) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(report.narrative()),
        OutputFormat::Json => {
            let document = ReportDocument::new(subject, report);
            let mut text =
                serde_json::to_string_pretty(&document).context("serialize report document")?;
            text.push('\n');
            Ok(text)
        }
    }
}

/// Progress display plus run log and transcript persistence.
struct RunRecorder {
    paths: Option<OutputPaths>,
    transcripts: bool,
    verbose: bool,
    io_error: Option<anyhow::Error>,
}

impl StepObserver for RunRecorder {
    fn step_started(&mut self, prompt: &StepPrompt, total: usize) {
        if self.verbose {
            eprintln!("[{}/{}] {}", prompt.index + 1, total, prompt.title);
        }
    }

    fn step_finished(&mut self, event: &StepEvent<'_>) {
        let entry = log_entry(event);
        if self.verbose {
            eprintln!("      {} in {} ms", entry.outcome, entry.duration_ms);
        }
        let Some(paths) = &self.paths else {
            return;
        };
        if let Err(err) = record_step(paths, self.transcripts, event, &entry) {
            tracing::warn!(step = %event.prompt.title, error = %err, "failed to record step");
            self.io_error.get_or_insert(err);
        }
    }
}

fn log_entry(event: &StepEvent<'_>) -> RunLogEntry {
    let builder = RunLogBuilder::new(event.prompt.index + 1, event.prompt.title.as_str())
        .with_duration(event.elapsed)
        .with_prompt_preview(&event.prompt.instruction);
    if let Some(err) = event.error {
        return builder.failed(err.to_string());
    }
    match event.outcome {
        Some(ExtractOutcome::Malformed(reason)) => {
            builder.degraded(format!("structured block malformed: {reason}"))
        }
        Some(ExtractOutcome::Absent) => builder.degraded("no structured block"),
        _ => builder.success(),
    }
}

fn record_step(
    paths: &OutputPaths,
    transcripts: bool,
    event: &StepEvent<'_>,
    entry: &RunLogEntry,
) -> Result<()> {
    append_run_log(paths, entry)?;
    if transcripts {
        let response = match (event.raw, event.error) {
            (Some(raw), _) => raw.to_string(),
            (None, Some(err)) => format!("<completion failed: {err}>"),
            (None, None) => String::new(),
        };
        store_transcript(paths, event.prompt.index + 1, &event.prompt.instruction, &response)?;
    }
    Ok(())
}
