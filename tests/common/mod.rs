//! Shared test infrastructure for integration tests.
//!
//! Runs the `areport` binary against a mock LM: a shell script that reads the
//! prompt on stdin and prints a canned response.

#![allow(dead_code)]
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Env vars that would leak a developer's setup into a test run.
const SCRUBBED_ENV: &[&str] = &[
    "AREPORT_LM_COMMAND",
    "AREPORT_MODEL",
    "OPENAI_API_KEY",
    "RUST_LOG",
];

/// Temp workspace holding a mock LM script and an output directory.
pub struct MockLm {
    dir: TempDir,
    script: PathBuf,
}

impl MockLm {
    /// Write `body` as a `sh` script; it sees the full prompt on stdin.
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let script = dir.path().join("mock_lm.sh");
        std::fs::write(&script, body).expect("write mock LM script");
        Self { dir, script }
    }

    /// Value for `--lm`.
    pub fn command(&self) -> String {
        let script = self.script.to_string_lossy();
        format!("sh {}", shell_words::quote(&script))
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `areport run <subject> --lm <mock> [extra...]`.
    pub fn run(&self, subject: &str, extra: &[&str]) -> Output {
        let lm = self.command();
        let mut args = vec!["run", subject, "--lm", lm.as_str()];
        args.extend_from_slice(extra);
        areport(&args, Some(self.path()))
    }
}

/// Run the binary with a scrubbed environment and an isolated config dir.
pub fn areport(args: &[&str], home: Option<&Path>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_areport"));
    cmd.args(args).stdin(Stdio::null());
    for key in SCRUBBED_ENV {
        cmd.env_remove(key);
    }
    if let Some(home) = home {
        cmd.env("HOME", home).env("XDG_CONFIG_HOME", home.join("config"));
    }
    cmd.output().expect("spawn areport")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
