//! CLI command definitions

use crate::store::MergeStrategy;
use clap::Args;
use std::path::PathBuf;

/// Ingest pipelines once and print their aggregate status
#[derive(Debug, Args, Clone)]
pub struct StatusCommand {
    /// Override the configured stage source file
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Override the configured merge strategy
    #[arg(long, value_enum)]
    pub merge: Option<MergeStrategyArg>,

    /// Also list every step
    #[arg(long)]
    pub steps: bool,
}

/// Ingest pipelines, replay a file of commands, and print the result
#[derive(Debug, Args, Clone)]
pub struct ApplyCommand {
    /// JSON-lines file of store commands
    #[arg(short, long)]
    pub events: PathBuf,

    /// Override the configured stage source file
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Persist the resulting pipelines to the configured backend
    #[arg(long)]
    pub persist: bool,

    /// Print every applied command
    #[arg(long)]
    pub trace_events: bool,
}

/// Validate a configuration file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the configuration file
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Merge strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MergeStrategyArg {
    Replace,
    Union,
}

impl From<MergeStrategyArg> for MergeStrategy {
    fn from(arg: MergeStrategyArg) -> Self {
        match arg {
            MergeStrategyArg::Replace => MergeStrategy::Replace,
            MergeStrategyArg::Union => MergeStrategy::Union,
        }
    }
}
