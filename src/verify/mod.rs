//! Three-stage acceptance test for generated task definitions.
//!
//! ```text
//! Structural ──ok──> Runtime ──ok──> Oracle ──ok──> Pass
//!     │                 │               │
//!     └──────err────────┴──────err──────┴──> Fail(stage, message)
//! ```
//!
//! Stages run strictly in order and the first failure ends the run. A
//! verdict is always returned; nothing in here panics or propagates an
//! error for bad input.

mod oracle;
mod runtime;
mod structural;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::ServiceContext;
use crate::ports::{EnvConfig, Simulator, TaskLoader};

pub use runtime::EnvGuard;
pub use structural::{lint, load_task_class, StructuralViolation};

/// One of the three sequential verification phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    /// Static lint plus sandboxed load and base-type check.
    Structural,
    /// Construction, environment creation, and reset.
    Runtime,
    /// Bounded-horizon oracle completion.
    Oracle,
}

impl Stage {
    /// The stage's 1-based number.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::Structural => 1,
            Self::Runtime => 2,
            Self::Oracle => 3,
        }
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Structural),
            2 => Ok(Self::Runtime),
            3 => Ok(Self::Oracle),
            other => Err(format!("invalid verification stage {other}; expected 1, 2 or 3")),
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.number()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Structural => "structural",
            Self::Runtime => "runtime",
            Self::Oracle => "oracle",
        };
        write!(f, "Step {} ({name})", self.number())
    }
}

/// Outcome of one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// All three stages passed.
    Pass,
    /// A stage failed.
    Fail {
        /// The failing stage.
        stage: Stage,
        /// Diagnostic message.
        message: String,
    },
}

impl Verdict {
    fn fail(stage: Stage, message: impl Into<String>) -> Self {
        Self::Fail {
            stage,
            message: message.into(),
        }
    }

    /// Whether verification passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// The failing stage, present iff verification failed.
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Pass => None,
            Self::Fail { stage, .. } => Some(*stage),
        }
    }

    /// The diagnostic, present iff verification failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail { message, .. } => Some(message),
        }
    }
}

/// Runs candidate task code through the three verification stages.
pub struct Verifier<'a> {
    loader: &'a dyn TaskLoader,
    simulator: &'a dyn Simulator,
    env_config: EnvConfig,
}

impl<'a> Verifier<'a> {
    /// Creates a verifier over the given collaborators with the default
    /// environment configuration.
    #[must_use]
    pub fn new(loader: &'a dyn TaskLoader, simulator: &'a dyn Simulator) -> Self {
        Self {
            loader,
            simulator,
            env_config: EnvConfig::default(),
        }
    }

    /// Creates a verifier using the context's loader and simulator.
    #[must_use]
    pub fn from_context(ctx: &'a ServiceContext) -> Self {
        Self::new(ctx.loader.as_ref(), ctx.simulator.as_ref())
    }

    /// Overrides the environment configuration.
    #[must_use]
    pub fn with_env_config(mut self, env_config: EnvConfig) -> Self {
        self.env_config = env_config;
        self
    }

    /// Verifies `code`, returning the verdict of the first failing stage or
    /// [`Verdict::Pass`].
    #[must_use]
    pub fn verify(&self, code: &str) -> Verdict {
        if let Err(violation) = lint(code) {
            info!(stage = 1, %violation, "structural check failed");
            return Verdict::fail(Stage::Structural, violation.to_string());
        }
        let class = match load_task_class(self.loader, code) {
            Ok(class) => class,
            Err(message) => {
                info!(stage = 1, %message, "load check failed");
                return Verdict::fail(Stage::Structural, message);
            }
        };
        debug!(class = class.name(), "stage 1 passed");

        let (mut env, observation) =
            match runtime::construct_and_reset(self.simulator, class.as_ref(), &self.env_config) {
                Ok(ready) => ready,
                Err(message) => {
                    info!(stage = 2, %message, "runtime check failed");
                    return Verdict::fail(Stage::Runtime, message);
                }
            };
        debug!("stage 2 passed");

        let result = oracle::run_to_completion(&mut env, observation);
        env.release();
        match result {
            Ok(steps) => {
                info!(steps, "verification passed");
                Verdict::Pass
            }
            Err(message) => {
                info!(stage = 3, %message, "oracle check failed");
                Verdict::fail(Stage::Oracle, message)
            }
        }
    }
}

/// Verifies `code` with the context's collaborators.
#[must_use]
pub fn verify_task_code(ctx: &ServiceContext, code: &str) -> Verdict {
    Verifier::from_context(ctx).verify(code)
}
