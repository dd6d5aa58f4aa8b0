//! Split a raw completion into narrative markdown and an embedded JSON payload.
//!
//! The model is asked to answer in markdown and append one ```json fenced
//! block. Only the first such block opening at the start of a line is
//! considered; a ```json mention inside prose is narrative. The block is removed from
//! the narrative only when it parses into a JSON object, so a malformed
//! payload never costs the reader any of the narrative.
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::LazyLock;

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ims)^[ \t]*```json[ \t]*\r?\n?(.*?)```").expect("JSON fence regex is valid")
});

/// How the structured block of a response was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ExtractOutcome {
    /// A fenced block parsed into a JSON object.
    Parsed,
    /// A fenced block was present but did not parse into a JSON object.
    Malformed(String),
    /// No fenced block was present.
    Absent,
}

/// Result of splitting one completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub narrative: String,
    pub structured: Map<String, Value>,
    pub outcome: ExtractOutcome,
}

impl Extraction {
    /// True only when the structured payload was found and parsed.
    pub fn parse_ok(&self) -> bool {
        matches!(self.outcome, ExtractOutcome::Parsed)
    }
}

/// Split `raw` into narrative and structured payload.
pub fn extract(raw: &str) -> Extraction {
    let Some(captures) = JSON_FENCE.captures(raw) else {
        return Extraction {
            narrative: raw.to_string(),
            structured: Map::new(),
            outcome: ExtractOutcome::Absent,
        };
    };
    let (Some(block), Some(interior)) = (captures.get(0), captures.get(1)) else {
        return unchanged(raw, "fenced block has no interior".to_string());
    };

    match parse_object(interior.as_str()) {
        Ok(structured) => Extraction {
            narrative: strip_block(raw, block.range()),
            structured,
            outcome: ExtractOutcome::Parsed,
        },
        Err(reason) => unchanged(raw, reason),
    }
}

fn unchanged(raw: &str, reason: String) -> Extraction {
    Extraction {
        narrative: raw.to_string(),
        structured: Map::new(),
        outcome: ExtractOutcome::Malformed(reason),
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        Err(err) => Err(format!("invalid JSON: {err}")),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn strip_block(raw: &str, block: Range<usize>) -> String {
    let before = raw[..block.start].trim_end();
    let after = raw[block.end..].trim();
    match (before.is_empty(), after.is_empty()) {
        (false, false) => format!("{before}\n\n{after}"),
        (false, true) => before.to_string(),
        (true, _) => after.to_string(),
    }
}
