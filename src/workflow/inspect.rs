//! Read-only helpers: preview the step prompts, or split a saved response.
use crate::cli::{ExtractArgs, StepsArgs};
use crate::extract::{extract, Extraction};
use crate::pipeline::validate_subject;
use crate::prompts::build_steps;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::Path;

#[derive(Serialize)]
struct ExtractView<'a> {
    parse_ok: bool,
    #[serde(flatten)]
    extraction: &'a Extraction,
}

pub fn run_steps(args: &StepsArgs) -> Result<()> {
    let subject = validate_subject(&args.subject)?;
    let steps = build_steps(subject);
    if args.json {
        let text = serde_json::to_string_pretty(&steps).context("serialize steps")?;
        println!("{text}");
        return Ok(());
    }
    for step in &steps {
        println!("## {}\n\n{}\n", step.title, step.instruction);
    }
    Ok(())
}

pub fn run_extract(args: &ExtractArgs) -> Result<()> {
    let raw = read_input(&args.file)?;
    let extraction = extract(&raw);
    let view = ExtractView {
        parse_ok: extraction.parse_ok(),
        extraction: &extraction,
    };
    let text = serde_json::to_string_pretty(&view).context("serialize extraction")?;
    println!("{text}");
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("read response from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_view_flattens_extraction() {
        let extraction = extract("Text\n```json\n{\"a\": 1}\n```");
        let view = ExtractView {
            parse_ok: extraction.parse_ok(),
            extraction: &extraction,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["parse_ok"], true);
        assert_eq!(json["narrative"], "Text");
        assert_eq!(json["structured"]["a"], 1);
        assert_eq!(json["outcome"]["status"], "parsed");
    }

    #[test]
    fn read_input_reports_missing_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = read_input(&dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }
}
