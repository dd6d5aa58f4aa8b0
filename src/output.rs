//! Report output: file layout, atomic writes and the JSON document form.
//!
//! Rendering markdown for display is left to whatever consumes these files.
use crate::pipeline::{AggregateReport, StepSummary};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Typed paths into an output directory.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    root: PathBuf,
}

impl OutputPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `report.md` path.
    pub fn report_path(&self) -> PathBuf {
        self.root.join("report.md")
    }

    /// Return the `structured.json` path.
    pub fn structured_path(&self) -> PathBuf {
        self.root.join("structured.json")
    }

    /// Return the `run_log.jsonl` path.
    pub fn run_log_path(&self) -> PathBuf {
        self.root.join("run_log.jsonl")
    }

    /// Return the `transcripts/` directory path.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.root.join("transcripts")
    }
}

/// Machine-readable form of a finished run.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub subject: &'a str,
    pub narrative: String,
    pub structured: &'a BTreeMap<String, Map<String, Value>>,
    pub steps: &'a [StepSummary],
}

impl<'a> ReportDocument<'a> {
    pub fn new(subject: &'a str, report: &'a AggregateReport) -> Self {
        Self {
            subject,
            narrative: report.narrative(),
            structured: report.structured(),
            steps: report.steps(),
        }
    }
}

/// Write `report.md` and `structured.json`; returns the written paths.
pub fn write_report(paths: &OutputPaths, report: &AggregateReport) -> Result<Vec<PathBuf>> {
    let report_path = paths.report_path();
    write_text_atomic(&report_path, &report.narrative())?;
    let structured_path = paths.structured_path();
    write_json_atomic(&structured_path, report.structured())?;
    Ok(vec![report_path, structured_path])
}

/// Write text through a temp file in the same directory, then rename.
pub fn write_text_atomic(path: &Path, text: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    temp.write_all(text.as_bytes())
        .with_context(|| format!("write temp file for {}", path.display()))?;
    temp.persist(path)
        .map_err(|err| anyhow!("persist {}: {}", path.display(), err.error))?;
    Ok(())
}

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value).context("serialize JSON output")?;
    text.push('\n');
    write_text_atomic(path, &text)
}
