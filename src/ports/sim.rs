//! Simulation port: task instances, oracle policies, and environments.
//!
//! A task instance is what a loaded task class produces. The simulator wraps
//! it in an environment that can be reset, stepped, and closed. Everything
//! crossing this boundary is plain data (`serde_json::Value` for opaque
//! observations and goals, numeric vectors for actions) so that adapters can
//! live in another process.

use std::any::Any;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::BoxError;

/// An opaque goal specification registered by a task during reset.
pub type Goal = serde_json::Value;

/// An opaque observation returned by reset and step.
pub type Observation = serde_json::Value;

/// An action: named numeric fields (e.g. `pose0_position`).
pub type Action = BTreeMap<String, Vec<f64>>;

/// Default number of oracle steps when a task does not declare one.
pub const DEFAULT_ORACLE_MAX_STEPS: u32 = 10;

/// Valid numeric range of one action field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBounds {
    /// Per-element lower bounds. A single value applies to every element.
    pub low: Vec<f64>,
    /// Per-element upper bounds. A single value applies to every element.
    pub high: Vec<f64>,
}

impl FieldBounds {
    fn bound(values: &[f64], index: usize) -> Option<f64> {
        match values {
            [] => None,
            [single] => Some(*single),
            many => many.get(index).copied(),
        }
    }

    /// Clamps each element of `values` into `[low, high]`.
    #[must_use]
    pub fn clip(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let v = Self::bound(&self.low, i).map_or(v, |lo| v.max(lo));
                Self::bound(&self.high, i).map_or(v, |hi| v.min(hi))
            })
            .collect()
    }
}

/// Per-field valid ranges declared by an environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSpace {
    /// Bounds keyed by action field name.
    pub fields: BTreeMap<String, FieldBounds>,
}

impl ActionSpace {
    /// Clips every field of `action` into its declared range.
    ///
    /// # Errors
    ///
    /// Returns an error naming the field if the action contains a field the
    /// action space does not declare.
    pub fn clip(&self, action: &Action) -> Result<Action, String> {
        action
            .iter()
            .map(|(name, values)| {
                let bounds = self
                    .fields
                    .get(name)
                    .ok_or_else(|| format!("action field '{name}' is not in the action space"))?;
                Ok((name.clone(), bounds.clip(values)))
            })
            .collect()
    }
}

/// Result of a single environment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Observation after the step.
    pub observation: Observation,
    /// Scalar reward.
    #[serde(default)]
    pub reward: f64,
    /// Whether the episode ended.
    pub done: bool,
    /// Free-form info mapping (carries `success`).
    #[serde(default)]
    pub info: serde_json::Map<String, serde_json::Value>,
}

/// Fixed construction parameters for a verification environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Observation modalities to render.
    pub modalities: Vec<String>,
    /// Environment seed.
    pub seed: u64,
    /// Debug mode for the environment.
    pub debug: bool,
    /// Whether to open a debug display window.
    pub display_debug_window: bool,
    /// Whether to hide the arm in rgb renders.
    pub hide_arm_rgb: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            modalities: vec!["rgb".to_string(), "segm".to_string()],
            seed: 42,
            debug: false,
            display_debug_window: false,
            hide_arm_rgb: true,
        }
    }
}

/// Scripted controller that can act toward a task's goals.
pub trait OraclePolicy: Send {
    /// Proposes an action for the given observation, or `None` when the
    /// policy cannot act.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy itself fails.
    fn act(&mut self, observation: &Observation) -> Result<Option<Action>, BoxError>;
}

/// Capability set of an instantiated task.
pub trait BenchmarkTask: Send {
    /// The live, mutable goal list.
    ///
    /// # Errors
    ///
    /// Returns an error if the task state cannot be read.
    fn goals(&self) -> Result<Vec<Goal>, BoxError>;

    /// The finalized goal snapshot, or `None` if it was never set.
    ///
    /// # Errors
    ///
    /// Returns an error if the task state cannot be read.
    fn all_goals(&self) -> Result<Option<Vec<Goal>>, BoxError>;

    /// Declared oracle step budget, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the task state cannot be read.
    fn oracle_max_steps(&self) -> Result<Option<u32>, BoxError>;

    /// Binds the task's oracle policy to `env`. `None` means no policy.
    ///
    /// # Errors
    ///
    /// Returns an error if building the policy fails.
    fn oracle(&self, env: &dyn SimEnv) -> Result<Option<Box<dyn OraclePolicy>>, BoxError>;

    /// Converts the task into `Any` so a simulator can recover its own type.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// A simulation environment wrapping one task instance.
pub trait SimEnv: Send {
    /// Resets the scene and returns the first observation.
    ///
    /// # Errors
    ///
    /// Returns an error if the task's reset raises.
    fn reset(&mut self) -> Result<Observation, BoxError>;

    /// Applies an action.
    ///
    /// # Errors
    ///
    /// Returns an error if stepping fails.
    fn step(&mut self, action: &Action) -> Result<StepOutcome, BoxError>;

    /// Releases the environment's resources.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown fails.
    fn close(&mut self) -> Result<(), BoxError>;

    /// The task instance this environment runs.
    fn task(&self) -> &dyn BenchmarkTask;

    /// Declared per-field valid ranges for actions.
    fn action_space(&self) -> &ActionSpace;

    /// Mapping from simulator object id to object name.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping cannot be read.
    fn obj_id_reverse_mapping(&self) -> Result<BTreeMap<u32, String>, BoxError>;
}

/// Constructs environments around task instances.
pub trait Simulator: Send + Sync {
    /// Builds an environment for `task` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be constructed.
    fn make_env(
        &self,
        task: Box<dyn BenchmarkTask>,
        config: &EnvConfig,
    ) -> Result<Box<dyn SimEnv>, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ActionSpace {
        let mut fields = BTreeMap::new();
        fields.insert(
            "pose0_position".to_string(),
            FieldBounds {
                low: vec![0.25, -0.5],
                high: vec![0.75, 0.5],
            },
        );
        fields.insert(
            "pose0_rotation".to_string(),
            FieldBounds {
                low: vec![-1.0],
                high: vec![1.0],
            },
        );
        ActionSpace { fields }
    }

    #[test]
    fn clip_clamps_per_element() {
        let mut action = Action::new();
        action.insert("pose0_position".to_string(), vec![0.9, -0.6]);
        let clipped = space().clip(&action).unwrap();
        assert_eq!(clipped["pose0_position"], vec![0.75, -0.5]);
    }

    #[test]
    fn clip_broadcasts_single_bound() {
        let mut action = Action::new();
        action.insert("pose0_rotation".to_string(), vec![1.000_001, 0.2, -3.0, 0.0]);
        let clipped = space().clip(&action).unwrap();
        assert_eq!(clipped["pose0_rotation"], vec![1.0, 0.2, -1.0, 0.0]);
    }

    #[test]
    fn clip_leaves_in_range_values_untouched() {
        let mut action = Action::new();
        action.insert("pose0_position".to_string(), vec![0.5, 0.0]);
        let clipped = space().clip(&action).unwrap();
        assert_eq!(clipped, action);
    }

    #[test]
    fn clip_rejects_unknown_field() {
        let mut action = Action::new();
        action.insert("gripper".to_string(), vec![1.0]);
        let err = space().clip(&action).unwrap_err();
        assert!(err.contains("gripper"));
    }

    #[test]
    fn env_config_defaults() {
        let config = EnvConfig::default();
        assert_eq!(config.modalities, vec!["rgb", "segm"]);
        assert_eq!(config.seed, 42);
        assert!(!config.debug);
        assert!(config.hide_arm_rgb);
    }
}
