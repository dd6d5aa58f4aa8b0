//! Local LM command backend.
//!
//! The command receives the system instruction and the step instruction on
//! stdin and must print the completion to stdout. Sampling options are
//! exported to the child as `AREPORT_MODEL`, `AREPORT_MAX_TOKENS` and
//! `AREPORT_TEMPERATURE` so wrapper scripts can forward them.
use super::{non_empty, CompletionClient, CompletionError, CompletionOptions, RawCompletion};
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Completion client that shells out to a configured command.
#[derive(Debug, Clone)]
pub struct CommandClient {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandClient {
    /// Parse `command` with shell quoting rules and resolve its program.
    pub fn new(command: &str) -> Result<Self> {
        let mut argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        let program_name = argv.remove(0);
        let program = which::which(&program_name)
            .with_context(|| format!("resolve LM command program: {program_name}"))?;
        Ok(Self {
            program,
            args: argv,
        })
    }
}

impl CompletionClient for CommandClient {
    fn complete(&self, system: &str, user: &str, options: &CompletionOptions) -> RawCompletion {
        let prompt = compose_prompt(system, user);
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("AREPORT_MODEL", &options.model)
            .env("AREPORT_MAX_TOKENS", options.max_output_tokens.to_string())
            .env("AREPORT_TEMPERATURE", options.temperature.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                CompletionError::Command(format!("spawn {}: {err}", self.program.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .map_err(|err| CompletionError::Command(format!("write prompt to stdin: {err}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| CompletionError::Command(format!("wait for LM command: {err}")))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm invoke complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompletionError::Command(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8(output.stdout).map_err(|err| {
            CompletionError::InvalidResponse(format!("decode LM stdout as UTF-8: {err}"))
        })?;
        non_empty(text)
    }
}

fn compose_prompt(system: &str, user: &str) -> String {
    format!("{}\n\n{}\n", system.trim_end(), user.trim())
}
