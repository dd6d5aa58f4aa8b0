//! Pipeline configuration helpers.
//!
//! This module loads, validates, and defaults the JSON config that fixes the
//! model, sampling parameters and LM backend for every step of a run.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current schema version for `config.json`.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
/// Environment variable that forces the command backend.
pub const LM_COMMAND_ENV: &str = "AREPORT_LM_COMMAND";
/// Environment variable that overrides the configured model.
pub const MODEL_ENV: &str = "AREPORT_MODEL";

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1500;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Model, sampling and backend settings shared by every step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub schema_version: u32,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Where completions come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// OpenAI-compatible HTTP endpoint.
    Http {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Local command reading the prompt on stdin.
    Command { command: String },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Http {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Build the config used when no config file exists.
pub fn default_config() -> PipelineConfig {
    PipelineConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        model: default_model(),
        max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        temperature: DEFAULT_TEMPERATURE,
        backend: BackendConfig::default(),
    }
}

/// Render a pretty JSON config stub.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&default_config()).context("serialize config stub")
}

/// Per-user config location, e.g. `~/.config/areport/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("areport").join("config.json"))
}

/// Load a config file.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Persist a config to disk in a stable JSON format.
pub fn write_config(path: &Path, config: &PipelineConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(config).context("serialize config")?;
    text.push('\n');
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate schema version and value ranges.
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.model.trim().is_empty() {
        return Err(anyhow!("model must be non-empty"));
    }
    if config.max_output_tokens == 0 {
        return Err(anyhow!("max_output_tokens must be greater than zero"));
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(anyhow!(
            "temperature must be within 0.0..=2.0 (got {})",
            config.temperature
        ));
    }
    match &config.backend {
        BackendConfig::Http {
            base_url,
            api_key_env,
            timeout_secs,
        } => {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(anyhow!(
                    "backend.base_url must be an http(s) URL (got {base_url:?})"
                ));
            }
            if api_key_env.trim().is_empty() {
                return Err(anyhow!("backend.api_key_env must be non-empty"));
            }
            if *timeout_secs == 0 {
                return Err(anyhow!("backend.timeout_secs must be greater than zero"));
            }
        }
        BackendConfig::Command { command } => {
            if command.trim().is_empty() {
                return Err(anyhow!("backend.command must be non-empty"));
            }
        }
    }
    Ok(())
}

/// Overrides applied on top of the loaded config, highest priority first.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub lm_command: Option<String>,
    pub model: Option<String>,
}

impl ConfigOverrides {
    /// Merge explicit CLI values with the environment fallbacks.
    pub fn from_cli_and_env(lm_command: Option<&str>, model: Option<&str>) -> Self {
        Self {
            lm_command: lm_command
                .map(str::to_string)
                .or_else(|| non_blank_env(LM_COMMAND_ENV)),
            model: model.map(str::to_string).or_else(|| non_blank_env(MODEL_ENV)),
        }
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Apply overrides to a loaded config.
pub fn apply_overrides(mut config: PipelineConfig, overrides: &ConfigOverrides) -> PipelineConfig {
    if let Some(command) = &overrides.lm_command {
        config.backend = BackendConfig::Command {
            command: command.clone(),
        };
    }
    if let Some(model) = &overrides.model {
        config.model = model.clone();
    }
    config
}

/// Resolve the effective config: explicit path, then the per-user file, then
/// defaults; overrides last. The result is validated.
pub fn resolve_config(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let base = match explicit {
        Some(path) => load_config(path)?,
        None => match default_config_path().filter(|path| path.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading user config");
                load_config(&path)?
            }
            None => default_config(),
        },
    };
    let config = apply_overrides(base, overrides);
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
