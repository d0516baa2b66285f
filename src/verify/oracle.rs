//! Stage 3: drive the task's oracle policy to completion.

use serde_json::Value;
use tracing::debug;

use super::runtime::EnvGuard;
use crate::ports::{Observation, SimEnv, DEFAULT_ORACLE_MAX_STEPS};

/// Runs the oracle for at most the task's step budget.
///
/// Returns the number of steps taken when the environment reports a
/// successful completion.
pub(super) fn run_to_completion(
    env: &mut EnvGuard,
    observation: Observation,
) -> Result<u32, String> {
    let max_steps = env
        .task()
        .oracle_max_steps()
        .map_err(|e| e.to_string())?
        .unwrap_or(DEFAULT_ORACLE_MAX_STEPS);

    let mut policy = {
        let env: &dyn SimEnv = &**env;
        let task = env.task();
        task.oracle(env).map_err(|e| e.to_string())?.ok_or_else(|| {
            let all_goals = task
                .all_goals()
                .map(|all| all.map_or(Value::from("NOT SET"), Value::from));
            format!(
                "task.oracle(env) returned None; check goals={}, _all_goals={}",
                describe(task.goals().map(Value::from)),
                describe(all_goals),
            )
        })?
    };

    let mut observation = observation;
    let mut info = serde_json::Map::new();
    for step in 0..max_steps {
        log_scene(env, step);

        let action = policy
            .act(&observation)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("oracle returned no action at step {step}; cannot continue."))?;
        let action = env.action_space().clip(&action)?;

        let outcome = env.step(&action).map_err(|e| e.to_string())?;
        observation = outcome.observation;
        info = outcome.info;
        if outcome.done {
            if info.get("success").is_some_and(is_truthy) {
                return Ok(step + 1);
            }
            break;
        }
    }

    Err(format!(
        "oracle did not complete the task within {max_steps} steps; info={}",
        Value::Object(info)
    ))
}

fn log_scene(env: &EnvGuard, step: u32) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let goals = env.task().goals().map(|g| g.len());
    let objects = env.obj_id_reverse_mapping().map(|m| m.into_keys().collect::<Vec<_>>());
    match (goals, objects) {
        (Ok(goals), Ok(objects)) => debug!(step, goals, ?objects, "oracle step"),
        (goals, objects) => debug!(step, ?goals, ?objects, "oracle step (scene state unavailable)"),
    }
}

fn describe<E: std::fmt::Display>(value: Result<Value, E>) -> String {
    match value {
        Ok(v) => v.to_string(),
        Err(e) => format!("<unavailable: {e}>"),
    }
}

/// Truthiness of a reported `success` value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!([])));
    }

    #[test]
    fn describe_reports_unavailable_state() {
        let err: Result<Value, &str> = Err("pipe closed");
        assert_eq!(describe(err), "<unavailable: pipe closed>");
        assert_eq!(describe::<&str>(Ok(json!([1]))), "[1]");
    }
}
