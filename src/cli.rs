//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI parser for `taskgen`.
#[derive(Debug, Parser)]
#[command(
    name = "taskgen",
    version,
    about = "Generate benchmark tasks with an LLM and keep only those that verify"
)]
pub struct Cli {
    /// Log debug detail to stderr (`TASKGEN_LOG` takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Propose, generate, and verify new tasks.
    Generate(GenerateArgs),
    /// Run the three verification stages on a task source file.
    Verify {
        /// Task source file to check.
        file: PathBuf,
        /// Append a failing verdict to the failure store.
        #[arg(long)]
        record_failure: bool,
    },
    /// List the retrieval corpus: builtin and previously generated tasks.
    Corpus,
    /// Show the failure memory as it would appear in a code prompt.
    Failures {
        /// Empty the failure store instead.
        #[arg(long)]
        clear: bool,
    },
}

/// Options for `taskgen generate`.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Free-form hint steering the task proposal.
    #[arg(long)]
    pub brief: Option<String>,

    /// Number of candidates to attempt.
    #[arg(short = 'n', long = "n", default_value_t = 1)]
    pub candidates: usize,

    /// Number of corpus examples retrieved per candidate.
    #[arg(short = 'k', long = "k", default_value_t = 5)]
    pub top_k: usize,

    /// Save passing tasks into the generated-task directory.
    #[arg(long)]
    pub save: bool,

    /// Model identifier; defaults to the configured model.
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature; defaults to the configured temperature.
    #[arg(long)]
    pub temperature: Option<f32>,
}
