//! Task registry port: the benchmark's builtin task implementations.

use serde::{Deserialize, Serialize};

use super::BoxError;

/// Reflection data for one registered builtin task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Compound key formatted as `"<group>/<task_name>"`.
    pub full_name: String,
    /// Declared class name of the task implementation.
    pub class_name: String,
    /// Defining module, when the benchmark can report it.
    #[serde(default)]
    pub module: Option<String>,
    /// Source listing of the class, when retrievable.
    #[serde(default)]
    pub source: Option<String>,
    /// Class docstring, when present.
    #[serde(default)]
    pub docstring: Option<String>,
}

/// Enumerates the benchmark's registered task implementations.
pub trait TaskRegistry: Send + Sync {
    /// Returns every registered task in the registry's own stable order.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be queried.
    fn entries(&self) -> Result<Vec<RegistryEntry>, BoxError>;
}
