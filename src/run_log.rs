//! Per-step run logging.
//!
//! Every finished step appends one line to `run_log.jsonl` in the output
//! directory, so a reader can see which steps degraded and why without
//! re-running the analysis.
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"step":1,"title":"Step 1: Material Classification","duration_ms":4200,"outcome":"success","parse_ok":true}
//! {"schema_version":1,"ts":1707900004200,"step":2,"title":"Step 2: Component Composition","duration_ms":3100,"outcome":"failed","parse_ok":false,"error":"empty response"}
//! ```
//!
//! With transcripts enabled, full prompts and raw responses are stored as
//! `transcripts/step_NN_prompt.txt` and `transcripts/step_NN_response.txt`.
use crate::output::OutputPaths;
use crate::util::truncate_string;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::time::Duration;

/// Current schema version for run_log.jsonl entries.
pub const RUN_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_BYTES: usize = 500;

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Completion succeeded and its structured block parsed.
    Success,
    /// Completion succeeded but carried no usable structured block.
    Degraded,
    /// Completion failed; the step holds the diagnostic narrative.
    Failed,
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A single run log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the entry was written.
    pub ts: u64,

    /// One-based step number.
    pub step: usize,

    pub title: String,

    pub duration_ms: u64,

    pub outcome: StepOutcome,

    pub parse_ok: bool,

    /// Why the step degraded or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Builder for run log entries.
pub struct RunLogBuilder {
    step: usize,
    title: String,
    duration: Duration,
    prompt_preview: Option<String>,
}

impl RunLogBuilder {
    pub fn new(step: usize, title: impl Into<String>) -> Self {
        Self {
            step,
            title: title.into(),
            duration: Duration::ZERO,
            prompt_preview: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set a preview of the prompt (truncated to 500 bytes).
    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        let preview = if prompt.len() > PROMPT_PREVIEW_BYTES {
            format!("{}...", truncate_string(prompt, PROMPT_PREVIEW_BYTES))
        } else {
            prompt.to_string()
        };
        self.prompt_preview = Some(preview);
        self
    }

    pub fn success(self) -> RunLogEntry {
        self.build(StepOutcome::Success, true, None)
    }

    pub fn degraded(self, reason: impl Into<String>) -> RunLogEntry {
        self.build(StepOutcome::Degraded, false, Some(reason.into()))
    }

    pub fn failed(self, error: impl Into<String>) -> RunLogEntry {
        self.build(StepOutcome::Failed, false, Some(error.into()))
    }

    fn build(self, outcome: StepOutcome, parse_ok: bool, error: Option<String>) -> RunLogEntry {
        RunLogEntry {
            schema_version: RUN_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            step: self.step,
            title: self.title,
            duration_ms: self.duration.as_millis() as u64,
            outcome,
            parse_ok,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Clear the run log and transcripts left by a previous run in the same
/// output directory.
pub fn reset_run_log(paths: &OutputPaths) -> Result<()> {
    let log_path = paths.run_log_path();
    if log_path.is_file() {
        fs::remove_file(&log_path)
            .with_context(|| format!("remove previous run_log: {}", log_path.display()))?;
    }
    let transcripts = paths.transcripts_dir();
    if transcripts.is_dir() {
        fs::remove_dir_all(&transcripts)
            .with_context(|| format!("remove previous transcripts: {}", transcripts.display()))?;
    }
    Ok(())
}

/// Append an entry to the run log.
pub fn append_run_log(paths: &OutputPaths, entry: &RunLogEntry) -> Result<()> {
    let log_path = paths.run_log_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("create output directory for run_log")?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open run_log for append: {}", log_path.display()))?;

    let line = serde_json::to_string(entry).context("serialize run_log entry")?;
    writeln!(file, "{line}").context("write run_log entry")?;
    Ok(())
}

/// Store the full prompt and raw response of a step.
pub fn store_transcript(
    paths: &OutputPaths,
    step: usize,
    prompt: &str,
    response: &str,
) -> Result<()> {
    let dir = paths.transcripts_dir();
    fs::create_dir_all(&dir).context("create transcripts directory")?;

    let prompt_path = dir.join(format!("step_{step:02}_prompt.txt"));
    let response_path = dir.join(format!("step_{step:02}_response.txt"));
    fs::write(&prompt_path, prompt)
        .with_context(|| format!("write prompt: {}", prompt_path.display()))?;
    fs::write(&response_path, response)
        .with_context(|| format!("write response: {}", response_path.display()))?;
    Ok(())
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_entries(paths: &OutputPaths) -> Vec<RunLogEntry> {
        std::fs::read_to_string(paths.run_log_path())
            .expect("read run log")
            .lines()
            .map(|line| serde_json::from_str(line).expect("parse entry"))
            .collect()
    }

    #[test]
    fn builder_sets_outcomes() {
        let entry = RunLogBuilder::new(1, "Step 1: A")
            .with_duration(Duration::from_millis(4200))
            .success();
        assert_eq!(entry.outcome, StepOutcome::Success);
        assert!(entry.parse_ok);
        assert_eq!(entry.duration_ms, 4200);
        assert!(entry.error.is_none());

        let entry = RunLogBuilder::new(2, "Step 2: B").degraded("no structured block");
        assert_eq!(entry.outcome, StepOutcome::Degraded);
        assert_eq!(entry.error.as_deref(), Some("no structured block"));

        let entry = RunLogBuilder::new(3, "Step 3: C").failed("empty response");
        assert_eq!(entry.outcome, StepOutcome::Failed);
        assert!(!entry.parse_ok);
    }

    #[test]
    fn prompt_preview_is_truncated() {
        let prompt = "p".repeat(800);
        let entry = RunLogBuilder::new(1, "Step 1: A")
            .with_prompt_preview(&prompt)
            .success();
        let preview = entry.prompt_preview.expect("preview");
        assert_eq!(preview.len(), PROMPT_PREVIEW_BYTES + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn append_writes_one_line_per_entry() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let paths = OutputPaths::new(dir.path().join("out"));

        append_run_log(&paths, &RunLogBuilder::new(1, "Step 1: A").success()).unwrap();
        append_run_log(&paths, &RunLogBuilder::new(2, "Step 2: B").failed("boom")).unwrap();

        let entries = read_entries(&paths);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].step, 1);
        assert_eq!(entries[1].outcome, StepOutcome::Failed);
        assert_eq!(entries[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn reset_clears_previous_run() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let paths = OutputPaths::new(dir.path().join("out"));
        append_run_log(&paths, &RunLogBuilder::new(1, "Step 1: A").success()).unwrap();
        store_transcript(&paths, 1, "old prompt", "old response").unwrap();

        reset_run_log(&paths).expect("reset");
        assert!(!paths.run_log_path().exists());
        assert!(!paths.transcripts_dir().exists());

        append_run_log(&paths, &RunLogBuilder::new(1, "Step 1: A").failed("boom")).unwrap();
        let entries = read_entries(&paths);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, StepOutcome::Failed);
    }

    #[test]
    fn reset_without_previous_run_is_a_no_op() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let paths = OutputPaths::new(dir.path().join("missing"));
        reset_run_log(&paths).expect("reset");
    }

    #[test]
    fn serialized_entry_omits_empty_fields() {
        let entry = RunLogBuilder::new(1, "Step 1: A").success();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"], "success");
        assert!(json.get("error").is_none());
        assert!(json.get("prompt_preview").is_none());
    }

    #[test]
    fn transcripts_are_written_per_step() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let paths = OutputPaths::new(dir.path().to_path_buf());

        store_transcript(&paths, 3, "prompt text", "response text").unwrap();

        let prompt_path = paths.transcripts_dir().join("step_03_prompt.txt");
        let response_path = paths.transcripts_dir().join("step_03_response.txt");
        assert_eq!(std::fs::read_to_string(prompt_path).unwrap(), "prompt text");
        assert_eq!(
            std::fs::read_to_string(response_path).unwrap(),
            "response text"
        );
    }

    #[test]
    fn outcome_display_matches_serde() {
        for outcome in [StepOutcome::Success, StepOutcome::Degraded, StepOutcome::Failed] {
            let json = serde_json::to_value(outcome).unwrap();
            assert_eq!(json, outcome.to_string());
        }
    }
}
