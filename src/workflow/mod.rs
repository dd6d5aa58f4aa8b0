//! Command handlers behind the CLI.
//!
//! Each handler resolves its inputs, calls into the core modules and owns the
//! stdout/stderr presentation, so the core stays free of terminal concerns.
mod init;
mod inspect;
mod run;

pub use init::run_config;
pub use inspect::{run_extract, run_steps};
pub use run::run_run;
