//! Step prompt assembly for the fixed analysis workflow.
//!
//! Every run issues the same ordered list of steps; only the subject changes.
//! Templates are compiled in so a run never depends on files next to the
//! binary.
use serde::Serialize;

/// Number of steps in every analysis run.
pub const STEP_COUNT: usize = 6;

/// System instruction sent with every step of a run.
pub const SYSTEM_INSTRUCTION: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/system.md"));

const SUBJECT_PLACEHOLDER: &str = "{subject}";

struct StepTemplate {
    title: &'static str,
    body: &'static str,
}

const STEP_TEMPLATES: [StepTemplate; STEP_COUNT] = [
    StepTemplate {
        title: "Step 1: Material Classification",
        body: "Bifurcate metals vs other materials for a {subject} and present it in a table.",
    },
    StepTemplate {
        title: "Step 2: Component Composition",
        body: "Identify components of the {subject} and provide chemical composition of metals used in each component. Present it in a tabular form.",
    },
    StepTemplate {
        title: "Step 3: Weight Benchmarks",
        body: "Provide the industry benchmark of weight distribution for a {subject}, component-wise, and the deviation from the composition in the previous step.",
    },
    StepTemplate {
        title: "Step 4: Weight Proportionality",
        body: "Combine the findings for the {subject} into a final simplified empirical formula to identify weight proportionality.",
    },
    StepTemplate {
        title: "Step 5: Reference Machine Specifications",
        body: "Provide specifications of a commonly used machine comparable to a {subject}, with its weight proportionality.",
    },
    StepTemplate {
        title: "Step 6: Manufacturer Examples",
        body: "Add real-life manufacturer examples and links for a {subject} from 'makeinchina.com' and 'indiamart.com'.",
    },
];

const STRUCTURED_SUFFIX: &str = "\n\nFinish with a single ```json fenced block holding one JSON object with the key figures from this step.";

/// One ordinal step of a run with its rendered instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepPrompt {
    /// Zero-based position in the run.
    pub index: usize,
    /// Display title, including the `Step N:` ordinal prefix.
    pub title: String,
    /// Instruction text sent as the user message.
    pub instruction: String,
}

impl StepPrompt {
    /// Build a prompt outside the fixed template list.
    pub fn new(index: usize, title: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            instruction: instruction.into(),
        }
    }

    /// Title without its ordinal prefix, used to key structured payloads.
    pub fn key(&self) -> &str {
        strip_ordinal(&self.title)
    }
}

/// Render the ordered step list for `subject`.
///
/// `subject` is substituted verbatim. [`crate::pipeline::Pipeline::run`]
/// trims the subject and rejects blank ones before calling this, so
/// instructions built by a run carry the trimmed subject.
pub fn build_steps(subject: &str) -> Vec<StepPrompt> {
    STEP_TEMPLATES
        .iter()
        .enumerate()
        .map(|(index, template)| {
            let mut instruction = template.body.replace(SUBJECT_PLACEHOLDER, subject);
            instruction.push_str(STRUCTURED_SUFFIX);
            StepPrompt::new(index, template.title, instruction)
        })
        .collect()
}

/// Strip a leading `Step N:` ordinal from a title.
pub fn strip_ordinal(title: &str) -> &str {
    let Some(rest) = title.strip_prefix("Step ") else {
        return title;
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return title;
    }
    match rest[digits..].strip_prefix(':') {
        Some(label) if !label.trim().is_empty() => label.trim(),
        _ => title,
    }
}
