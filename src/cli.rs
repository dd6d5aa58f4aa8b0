//! CLI argument parsing for the analysis workflow.
//!
//! The CLI is intentionally thin: it resolves configuration and hands the
//! subject to the pipeline, so the same core can be driven from elsewhere.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "areport",
    version,
    about = "Staged LM analysis report generator",
    after_help = "Examples:\n  areport run \"Tunnel boring machine, 6600 mm diameter\"\n  areport run \"Tire building machine\" --out-dir /tmp/tbm --transcripts\n  areport run \"Generator X\" --lm \"llm -m gpt-4o-mini\" --format json\n  areport steps \"Generator X\"\n  areport extract response.txt\n  areport config --write ~/.config/areport/config.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Emit progress and per-step diagnostics on stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Steps(StepsArgs),
    Extract(ExtractArgs),
    Config(ConfigArgs),
}

/// Stdout format for a finished run.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Joined markdown narrative
    #[default]
    Markdown,
    /// Subject, narrative, structured payloads and step status as JSON
    Json,
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Run every analysis step for a subject and print the report")]
pub struct RunArgs {
    /// Subject of the analysis (e.g. "Tunnel boring machine, 6600 mm diameter")
    pub subject: String,

    /// Config file (defaults to the per-user config, then built-in defaults)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// LM command reading the prompt on stdin (overrides the configured backend)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Model identifier (overrides the configured model)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Directory for report.md, structured.json and run_log.jsonl
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Also store full prompts and raw responses under <out-dir>/transcripts
    #[arg(long, requires = "out_dir")]
    pub transcripts: bool,

    /// Stdout format
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,
}

/// Steps command inputs.
#[derive(Parser, Debug)]
#[command(about = "Print the step prompts a run would issue for a subject")]
pub struct StepsArgs {
    pub subject: String,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Extract command inputs.
#[derive(Parser, Debug)]
#[command(about = "Split a saved LM response into narrative and structured payload")]
pub struct ExtractArgs {
    /// File holding a raw LM response ("-" for stdin)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Config command inputs.
#[derive(Parser, Debug)]
#[command(about = "Print or write the default config")]
pub struct ConfigArgs {
    /// Write the default config to this path instead of printing it
    #[arg(long, value_name = "PATH")]
    pub write: Option<PathBuf>,

    /// Overwrite an existing config file
    #[arg(long, requires = "write")]
    pub force: bool,
}
