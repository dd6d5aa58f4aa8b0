//! Step runner and orchestrator for a single analysis run.
//!
//! A run is a fold over the ordered step list: each step is executed to
//! completion before the next begins, and its result is appended to an
//! [`AggregateReport`] value that the caller receives at the end. Per-step
//! failures degrade into data inside the report; only a blank subject stops a
//! run, and it does so before any completion is requested.
use crate::extract::{extract, ExtractOutcome};
use crate::lm::{CompletionClient, CompletionError, CompletionOptions};
use crate::prompts::{build_steps, strip_ordinal, StepPrompt, SYSTEM_INSTRUCTION};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Narrative substituted for a step whose completion failed.
pub const STEP_FAILURE_NARRATIVE: &str = "An error occurred while generating the response.";

/// Errors that stop a run before it starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("subject must be non-empty")]
    EmptySubject,
}

/// Normalized outcome of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub title: String,
    pub narrative: String,
    pub structured: Map<String, Value>,
    /// False only when the completion itself failed.
    pub succeeded: bool,
    /// True when a structured payload was found and parsed.
    pub parse_ok: bool,
}

/// Per-step status kept alongside the report sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub title: String,
    pub succeeded: bool,
    pub parse_ok: bool,
}

/// Combined output of a full run, in step order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateReport {
    sections: Vec<String>,
    structured: BTreeMap<String, Map<String, Value>>,
    steps: Vec<StepSummary>,
}

impl AggregateReport {
    /// Fold one step result into the report.
    ///
    /// Payloads are keyed by the title without its ordinal prefix; empty
    /// payloads add no entry.
    fn append(mut self, result: StepResult) -> Self {
        self.sections.push(format!(
            "## {}\n\n{}\n\n",
            result.title, result.narrative
        ));
        if !result.structured.is_empty() {
            self.structured
                .insert(strip_ordinal(&result.title).to_string(), result.structured);
        }
        self.steps.push(StepSummary {
            title: result.title,
            succeeded: result.succeeded,
            parse_ok: result.parse_ok,
        });
        self
    }

    /// Markdown sections, one per step, in step order.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Structured payloads keyed by prefix-free step title.
    pub fn structured(&self) -> &BTreeMap<String, Map<String, Value>> {
        &self.structured
    }

    pub fn steps(&self) -> &[StepSummary] {
        &self.steps
    }

    /// All sections joined into one markdown document.
    pub fn narrative(&self) -> String {
        self.sections.concat()
    }

    pub fn succeeded_count(&self) -> usize {
        self.steps.iter().filter(|step| step.succeeded).count()
    }
}

/// Everything known about a step once it finishes.
///
/// The raw completion is only borrowed here; it is dropped once observers
/// have seen it.
pub struct StepEvent<'a> {
    pub prompt: &'a StepPrompt,
    pub result: &'a StepResult,
    pub raw: Option<&'a str>,
    /// How the structured block was handled; `None` when the completion failed.
    pub outcome: Option<&'a ExtractOutcome>,
    pub error: Option<&'a CompletionError>,
    pub elapsed: Duration,
}

/// Hooks for progress display and run logging.
pub trait StepObserver {
    fn step_started(&mut self, _prompt: &StepPrompt, _total: usize) {}
    fn step_finished(&mut self, _event: &StepEvent<'_>) {}
}

impl StepObserver for () {}

/// A configured pipeline: client, system instruction and sampling options.
pub struct Pipeline<C> {
    client: C,
    system_instruction: String,
    options: CompletionOptions,
}

impl<C: CompletionClient> Pipeline<C> {
    pub fn new(client: C, options: CompletionOptions) -> Self {
        Self {
            client,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            options,
        }
    }

    /// Run every step for `subject`.
    ///
    /// Surrounding whitespace is trimmed from `subject` before templating; a
    /// blank subject fails with [`PipelineError::EmptySubject`].
    pub fn run(&self, subject: &str) -> Result<AggregateReport, PipelineError> {
        self.run_observed(subject, &mut ())
    }

    /// Run every step for `subject`, reporting progress to `observer`.
    pub fn run_observed(
        &self,
        subject: &str,
        observer: &mut dyn StepObserver,
    ) -> Result<AggregateReport, PipelineError> {
        let subject = validate_subject(subject)?;
        self.run_steps(&build_steps(subject), observer)
    }

    /// Run an explicit step list in order.
    pub(crate) fn run_steps(
        &self,
        steps: &[StepPrompt],
        observer: &mut dyn StepObserver,
    ) -> Result<AggregateReport, PipelineError> {
        let total = steps.len();
        let report = steps
            .iter()
            .fold(AggregateReport::default(), |report, prompt| {
                observer.step_started(prompt, total);
                report.append(self.execute_step(prompt, observer))
            });
        tracing::info!(
            steps = total,
            succeeded = report.succeeded_count(),
            structured = report.structured().len(),
            "run complete"
        );
        Ok(report)
    }

    /// Run a single step and normalize its outcome.
    pub fn run_step(&self, prompt: &StepPrompt) -> StepResult {
        self.execute_step(prompt, &mut ())
    }

    fn execute_step(&self, prompt: &StepPrompt, observer: &mut dyn StepObserver) -> StepResult {
        let start = Instant::now();
        let completion =
            self.client
                .complete(&self.system_instruction, &prompt.instruction, &self.options);
        let elapsed = start.elapsed();

        match completion {
            Ok(raw) => {
                let extraction = extract(&raw);
                match &extraction.outcome {
                    ExtractOutcome::Parsed => {}
                    ExtractOutcome::Malformed(reason) => tracing::warn!(
                        step = %prompt.title,
                        %reason,
                        "structured block malformed; keeping full narrative"
                    ),
                    ExtractOutcome::Absent => tracing::warn!(
                        step = %prompt.title,
                        "no structured block in response"
                    ),
                }
                let parse_ok = extraction.parse_ok();
                let result = StepResult {
                    title: prompt.title.clone(),
                    narrative: extraction.narrative,
                    structured: extraction.structured,
                    succeeded: true,
                    parse_ok,
                };
                observer.step_finished(&StepEvent {
                    prompt,
                    result: &result,
                    raw: Some(raw.as_str()),
                    outcome: Some(&extraction.outcome),
                    error: None,
                    elapsed,
                });
                result
            }
            Err(err) => {
                tracing::warn!(step = %prompt.title, error = %err, "completion failed");
                let result = StepResult {
                    title: prompt.title.clone(),
                    narrative: STEP_FAILURE_NARRATIVE.to_string(),
                    structured: Map::new(),
                    succeeded: false,
                    parse_ok: false,
                };
                observer.step_finished(&StepEvent {
                    prompt,
                    result: &result,
                    raw: None,
                    outcome: None,
                    error: Some(&err),
                    elapsed,
                });
                result
            }
        }
    }
}

/// Reject blank subjects; returns the trimmed subject.
pub fn validate_subject(subject: &str) -> Result<&str, PipelineError> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::EmptySubject);
    }
    Ok(trimmed)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
