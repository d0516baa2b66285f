//! Stage 1: authoring-contract lint and sandboxed load.

use std::fmt;

use crate::ports::{TaskClass, TaskLoader};
use crate::source;

/// A violation of the task authoring contract found by [`lint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralViolation {
    /// The code redefines `oracle`; generated tasks must inherit it.
    OracleOverride,
    /// The code never appends to `self.goals`.
    MissingGoalRegistration,
    /// The code never snapshots `self.goals` into `self._all_goals`.
    MissingGoalSnapshot,
}

impl fmt::Display for StructuralViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::OracleOverride => {
                "Should not override oracle(); inherit BaseTask.oracle instead."
            }
            Self::MissingGoalRegistration => {
                "No self.goals.append(...) found in reset(); oracle has no goals to follow."
            }
            Self::MissingGoalSnapshot => {
                "Missing self._all_goals = self.goals.copy() after setting goals."
            }
        };
        f.write_str(message)
    }
}

/// Checks the authoring contract on raw source text.
///
/// Heuristic: matching is textual, so commented-out code counts and unusual
/// spellings slip through. The runtime stages re-check what matters.
///
/// # Errors
///
/// Returns the first violation found, in the order oracle override, goal
/// registration, goal snapshot.
pub fn lint(code: &str) -> Result<(), StructuralViolation> {
    if source::overrides_oracle(code) {
        return Err(StructuralViolation::OracleOverride);
    }
    if !source::registers_goal(code) {
        return Err(StructuralViolation::MissingGoalRegistration);
    }
    if !source::finalizes_goals(code) {
        return Err(StructuralViolation::MissingGoalSnapshot);
    }
    Ok(())
}

/// Loads `code` through the sandbox and returns the task class it declares.
///
/// The class name is the first `class Name(` in the source. The class must
/// exist in the loaded namespace and extend the benchmark's task base type.
///
/// # Errors
///
/// Returns the diagnostic text for any failure: no class declaration, a
/// load error, a missing class, or the wrong base type.
pub fn load_task_class(loader: &dyn TaskLoader, code: &str) -> Result<Box<dyn TaskClass>, String> {
    let name = source::class_name(code)
        .ok_or_else(|| "No class definition found in generated code.".to_string())?;
    let mut namespace = loader.load(code).map_err(|e| e.to_string())?;
    let class = namespace.take(name).ok_or_else(|| {
        format!("Class {name} not found after loading; namespace has {:?}", namespace.class_names())
    })?;
    if !class.extends_base_task() {
        return Err(format!("{name} does not inherit BaseTask"));
    }
    Ok(class)
}
