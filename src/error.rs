//! Error types for the generation loop, the harness bridge, and configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::ports::BoxError;

/// Failure of one candidate's collaborator steps (proposal, retrieval,
/// code generation). These skip the candidate; they never end the run.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The language model call failed.
    #[error("LLM {step} call failed: {source}")]
    Llm {
        /// Which step issued the call (`proposal` or `codegen`).
        step: &'static str,
        /// Underlying port error.
        source: BoxError,
    },

    /// The model reply had no fenced code block.
    #[error("LLM reply contained no code block; full reply:\n{reply}")]
    NoCodeBlock {
        /// The complete reply text.
        reply: String,
    },

    /// The retrieval backend failed.
    #[error("retrieval failed: {0}")]
    Retrieval(BoxError),
}

/// Failures talking to the external simulation harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No harness command is configured.
    #[error("no simulation harness configured; set TASKGEN_HARNESS or `harness.command`")]
    NotConfigured,

    /// The harness process could not be started.
    #[error("failed to spawn harness `{command}`: {source}")]
    Spawn {
        /// The command line that was attempted.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Reading from or writing to the harness pipes failed.
    #[error("harness I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The harness sent something that is not a protocol reply.
    #[error("harness protocol error during `{op}`: {detail}")]
    Protocol {
        /// The request operation.
        op: String,
        /// What was wrong with the reply.
        detail: String,
    },

    /// The harness reported an error for the request.
    #[error("{0}")]
    Remote(String),

    /// The harness exited before replying.
    #[error("harness closed its output during `{0}`")]
    Closed(String),
}

/// Failures loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`crate::config::Settings`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
}
