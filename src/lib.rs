//! Staged LM analysis reports.
//!
//! A run sends a fixed, ordered list of step prompts about one subject to an
//! LM, splits each answer into markdown narrative and an embedded JSON
//! payload, and folds the results into one report. See [`pipeline`] for the
//! run model and [`extract`] for the response contract.
pub mod cli;
pub mod config;
pub mod extract;
pub mod lm;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod run_log;
pub mod util;
pub mod workflow;
