//! End-to-end runs of the `areport` binary against a mock LM script.

mod common;

use common::{areport, stderr, stdout, MockLm};
use serde_json::Value;

/// Plain narrative for every step; only the benchmark step carries a payload.
const BENCHMARK_ONLY: &str = r#"prompt=$(cat)
case "$prompt" in
  *"industry benchmark of weight"*)
    printf 'Frame dominates the weight.\n```json\n{"frame_share": 0.4, "unit": "fraction"}\n```\n'
    ;;
  *)
    printf 'Mostly steel.\n'
    ;;
esac
"#;

const ALWAYS_FAILS: &str = "cat >/dev/null\necho 'backend down' >&2\nexit 1\n";

const MALFORMED_BLOCK: &str = r#"cat >/dev/null
printf 'Narrative kept.\n```json\n{not json}\n```\n'
"#;

#[test]
fn run_joins_narratives_and_collects_structured_payloads() {
    let mock = MockLm::new(BENCHMARK_ONLY);
    let out_dir = mock.out_dir();
    let out = out_dir.to_string_lossy().into_owned();
    let output = mock.run(
        "Tunnel boring machine, 6600 mm diameter",
        &["--out-dir", &out, "--transcripts"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let narrative = stdout(&output);
    assert_eq!(narrative.matches("## Step ").count(), 6);
    assert!(narrative.starts_with("## Step 1: Material Classification\n\nMostly steel.\n\n"));
    assert!(narrative.contains("## Step 3: Weight Benchmarks\n\nFrame dominates the weight.\n\n"));
    assert!(!narrative.contains("```json"));

    let report = std::fs::read_to_string(out_dir.join("report.md")).expect("read report.md");
    assert_eq!(report, narrative);

    let structured: Value = serde_json::from_str(
        &std::fs::read_to_string(out_dir.join("structured.json")).expect("read structured.json"),
    )
    .expect("parse structured.json");
    let keys: Vec<&String> = structured.as_object().expect("object").keys().collect();
    assert_eq!(keys, vec!["Weight Benchmarks"]);
    assert_eq!(structured["Weight Benchmarks"]["frame_share"], 0.4);

    let log = std::fs::read_to_string(out_dir.join("run_log.jsonl")).expect("read run log");
    let entries: Vec<Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).expect("parse run log line"))
        .collect();
    assert_eq!(entries.len(), 6);
    assert_eq!(entries[2]["outcome"], "success");
    assert_eq!(entries[0]["outcome"], "degraded");

    let transcripts = out_dir.join("transcripts");
    let prompt = std::fs::read_to_string(transcripts.join("step_03_prompt.txt"))
        .expect("read step 3 prompt");
    assert!(prompt.contains("Tunnel boring machine, 6600 mm diameter"));
    assert!(transcripts.join("step_06_response.txt").is_file());
}

#[test]
fn failing_backend_still_produces_every_section() {
    let mock = MockLm::new(ALWAYS_FAILS);
    let output = mock.run("Generator X", &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let narrative = stdout(&output);
    assert_eq!(
        narrative
            .matches("An error occurred while generating the response.")
            .count(),
        6
    );
    assert!(narrative.contains("## Step 6: Manufacturer Examples"));
    assert!(stderr(&output).contains("0/6 steps succeeded"));
}

#[test]
fn malformed_block_keeps_raw_text_and_omits_payload() {
    let mock = MockLm::new(MALFORMED_BLOCK);
    let output = mock.run("Generator X", &["--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let document: Value = serde_json::from_str(&stdout(&output)).expect("parse JSON report");
    assert_eq!(document["subject"], "Generator X");
    assert_eq!(document["structured"], serde_json::json!({}));
    assert!(document["narrative"]
        .as_str()
        .expect("narrative string")
        .contains("```json\n{not json}\n```"));
    let steps = document["steps"].as_array().expect("steps array");
    assert_eq!(steps.len(), 6);
    assert!(steps
        .iter()
        .all(|step| step["succeeded"] == true && step["parse_ok"] == false));
}

#[test]
fn blank_subject_is_rejected_before_any_completion() {
    let mock = MockLm::new("touch \"$(dirname \"$0\")/called\"\ncat\n");
    let output = mock.run("   ", &[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("subject"));
    assert!(!mock.path().join("called").exists());
}

#[test]
fn steps_command_prints_six_prompts() {
    let output = areport(&["steps", "Tire building machine"], None);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert_eq!(text.matches("## Step ").count(), 6);
    assert!(text.contains("Tire building machine"));

    let output = areport(&["steps", "Tire building machine", "--json"], None);
    let steps: Value = serde_json::from_str(&stdout(&output)).expect("parse steps JSON");
    assert_eq!(steps.as_array().map(Vec::len), Some(6));
    assert_eq!(steps[4]["title"], "Step 5: Reference Machine Specifications");
}

#[test]
fn extract_command_splits_saved_response() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("response.txt");
    std::fs::write(&path, "Summary.\n```json\n{\"ratio\": 2}\n```\n").expect("write response");

    let file = path.to_string_lossy().into_owned();
    let output = areport(&["extract", &file], None);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let view: Value = serde_json::from_str(&stdout(&output)).expect("parse extract JSON");
    assert_eq!(view["parse_ok"], true);
    assert_eq!(view["narrative"], "Summary.");
    assert_eq!(view["structured"]["ratio"], 2);
}

#[test]
fn unknown_lm_command_fails_fast() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let output = areport(
        &["run", "Generator X", "--lm", "areport-missing-lm-binary"],
        Some(dir.path()),
    );
    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
}

#[test]
fn rerun_into_same_out_dir_replaces_run_log() {
    let mock = MockLm::new(BENCHMARK_ONLY);
    let out_dir = mock.out_dir();
    let out = out_dir.to_string_lossy().into_owned();

    let first = mock.run("Generator X", &["--out-dir", &out, "--transcripts"]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    let second = mock.run("Generator Y", &["--out-dir", &out]);
    assert!(second.status.success(), "stderr: {}", stderr(&second));

    let log = std::fs::read_to_string(out_dir.join("run_log.jsonl")).expect("read run log");
    assert_eq!(log.lines().count(), 6);
    assert!(!out_dir.join("transcripts").exists());
    let report = std::fs::read_to_string(out_dir.join("report.md")).expect("read report.md");
    assert_eq!(report, stdout(&second));
}

#[test]
fn run_log_failure_still_prints_report() {
    let mock = MockLm::new(BENCHMARK_ONLY);
    let out_dir = mock.out_dir();
    // A directory where the log file belongs makes every append fail.
    std::fs::create_dir_all(out_dir.join("run_log.jsonl")).expect("block run log path");
    let out = out_dir.to_string_lossy().into_owned();

    let output = mock.run("Generator X", &["--out-dir", &out]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("record run log"));
    let narrative = stdout(&output);
    assert_eq!(narrative.matches("## Step ").count(), 6);
    let report = std::fs::read_to_string(out_dir.join("report.md")).expect("read report.md");
    assert_eq!(report, narrative);
}
