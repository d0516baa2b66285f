//! Stage 2: construct the task, wrap it in an environment, and reset.

use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::ports::{EnvConfig, Observation, SimEnv, Simulator, TaskClass};

/// Owns an environment and closes it exactly once.
///
/// Closing happens on [`EnvGuard::release`] or, failing that, on drop.
pub struct EnvGuard {
    env: Option<Box<dyn SimEnv>>,
}

impl EnvGuard {
    /// Takes ownership of `env`.
    #[must_use]
    pub fn new(env: Box<dyn SimEnv>) -> Self {
        Self { env: Some(env) }
    }

    /// Closes the environment now. Teardown errors are logged, not returned.
    pub fn release(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(mut env) = self.env.take() {
            if let Err(e) = env.close() {
                warn!(error = %e, "environment teardown failed");
            }
        }
    }
}

impl Deref for EnvGuard {
    type Target = dyn SimEnv;

    fn deref(&self) -> &Self::Target {
        self.env.as_deref().expect("environment used after release")
    }
}

impl DerefMut for EnvGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.env.as_deref_mut().expect("environment used after release")
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Instantiates `class`, builds its environment, resets it, and checks that
/// reset produced pursuable goals.
///
/// On success the guarded environment and the first observation are
/// returned. On failure the environment, if one was built, has already been
/// closed.
///
/// # Errors
///
/// Returns the diagnostic text: the raised error's message for construction
/// or reset failures, or a description of the violated post-reset check.
pub fn construct_and_reset(
    simulator: &dyn Simulator,
    class: &dyn TaskClass,
    config: &EnvConfig,
) -> Result<(EnvGuard, Observation), String> {
    let task = class.instantiate(config.debug).map_err(|e| e.to_string())?;
    let mut env = EnvGuard::new(simulator.make_env(task, config).map_err(|e| e.to_string())?);
    let observation = env.reset().map_err(|e| e.to_string())?;

    let goals = env.task().goals().map_err(|e| e.to_string())?;
    if goals.is_empty() {
        return Err("reset() left self.goals empty; the oracle has nothing to pursue.".to_string());
    }
    let snapshot = env.task().all_goals().map_err(|e| e.to_string())?;
    if snapshot.map_or(true, |all| all.is_empty()) {
        return Err("reset() did not initialize self._all_goals.".to_string());
    }

    debug!(goals = goals.len(), "reset produced goals");
    Ok((env, observation))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::ports::TaskLoader;
    use crate::testing::{minimal_task_code, FakeLoader, FakeSimulator, TaskScript};

    fn class_for(script: TaskScript) -> Box<dyn TaskClass> {
        let loader = FakeLoader::new(script);
        let mut namespace = loader.load(&minimal_task_code()).unwrap();
        namespace.take("PlaceBlockInBowl").unwrap()
    }

    #[test]
    fn guard_closes_on_drop() {
        let simulator = FakeSimulator::default();
        let class = class_for(TaskScript::completes_in(1));
        let (env, _) =
            construct_and_reset(&simulator, class.as_ref(), &EnvConfig::default()).unwrap();
        assert_eq!(simulator.closes.load(Ordering::SeqCst), 0);
        drop(env);
        assert_eq!(simulator.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_then_drop_closes_once() {
        let simulator = FakeSimulator::default();
        let class = class_for(TaskScript::completes_in(1));
        let (env, _) =
            construct_and_reset(&simulator, class.as_ref(), &EnvConfig::default()).unwrap();
        env.release();
        assert_eq!(simulator.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn teardown_error_is_swallowed() {
        let simulator = FakeSimulator::default();
        let class = class_for(TaskScript::completes_in(1).close_fails());
        let (env, _) =
            construct_and_reset(&simulator, class.as_ref(), &EnvConfig::default()).unwrap();
        env.release();
        assert_eq!(simulator.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn make_env_error_is_reported() {
        let simulator = FakeSimulator::failing("display not available");
        let class = class_for(TaskScript::completes_in(1));
        let err = construct_and_reset(&simulator, class.as_ref(), &EnvConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, "display not available");
    }
}
