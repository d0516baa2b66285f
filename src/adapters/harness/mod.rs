//! Bridge to an external simulation harness process.
//!
//! The benchmark itself lives outside this crate. A harness program (for
//! VIMA-Bench, a small Python driver) exposes the registry, the loader
//! sandbox, and the simulator over stdin/stdout using the JSON-lines
//! protocol in [`process`]. Every load starts a fresh process; the classes,
//! task instances, environments, and policies derived from that load share
//! it and the process is killed once the last of them is dropped.

pub mod process;

use std::any::Any;
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::HarnessError;
use crate::ports::{
    Action, ActionSpace, BenchmarkTask, BoxError, EnvConfig, Goal, LoadedNamespace, Observation,
    OraclePolicy, RegistryEntry, SimEnv, Simulator, StepOutcome, TaskClass, TaskLoader,
    TaskRegistry,
};
use process::{HarnessProcess, SharedProcess};

/// Registry, loader, and simulator backed by a harness command.
#[derive(Debug, Clone, Default)]
pub struct HarnessBridge {
    command: Vec<String>,
}

impl HarnessBridge {
    /// Creates a bridge for `command`. An empty command yields a bridge whose
    /// every call fails with [`HarnessError::NotConfigured`].
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

fn call_as<T: DeserializeOwned>(
    process: &SharedProcess,
    op: &str,
    args: Value,
) -> Result<T, BoxError> {
    let value = process::call(process, op, args)?;
    serde_json::from_value(value).map_err(|e| {
        HarnessError::Protocol {
            op: op.to_string(),
            detail: format!("unexpected reply shape: {e}"),
        }
        .into()
    })
}

impl TaskRegistry for HarnessBridge {
    fn entries(&self) -> Result<Vec<RegistryEntry>, BoxError> {
        let process = HarnessProcess::spawn_shared(&self.command)?;
        let entries: Vec<RegistryEntry> = call_as(&process, "registry", Value::Null)?;
        debug!(count = entries.len(), "harness registry");
        Ok(entries)
    }
}

#[derive(Deserialize)]
struct LoadReply {
    classes: Vec<ClassInfo>,
}

#[derive(Deserialize)]
struct ClassInfo {
    name: String,
    #[serde(default)]
    extends_base_task: bool,
}

impl TaskLoader for HarnessBridge {
    fn load(&self, code: &str) -> Result<LoadedNamespace, BoxError> {
        let process = HarnessProcess::spawn_shared(&self.command)?;
        let reply: LoadReply = call_as(&process, "load", json!({ "code": code }))?;
        let classes = reply
            .classes
            .into_iter()
            .map(|info| {
                Box::new(HarnessClass {
                    name: info.name,
                    extends_base_task: info.extends_base_task,
                    process: process.clone(),
                }) as Box<dyn TaskClass>
            })
            .collect();
        Ok(LoadedNamespace::new(classes))
    }
}

impl Simulator for HarnessBridge {
    fn make_env(
        &self,
        task: Box<dyn BenchmarkTask>,
        config: &EnvConfig,
    ) -> Result<Box<dyn SimEnv>, BoxError> {
        let task = task
            .into_any()
            .downcast::<HarnessTask>()
            .map_err(|_| "task instance was not produced by the harness loader")?;
        #[derive(Deserialize)]
        struct MakeEnvReply {
            #[serde(default)]
            action_space: ActionSpace,
        }
        let reply: MakeEnvReply = call_as(&task.process, "make_env", json!({ "config": config }))?;
        Ok(Box::new(HarnessEnv {
            process: task.process.clone(),
            task: *task,
            action_space: reply.action_space,
        }))
    }
}

struct HarnessClass {
    name: String,
    extends_base_task: bool,
    process: SharedProcess,
}

impl TaskClass for HarnessClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn extends_base_task(&self) -> bool {
        self.extends_base_task
    }

    fn instantiate(&self, debug: bool) -> Result<Box<dyn BenchmarkTask>, BoxError> {
        process::call(
            &self.process,
            "instantiate",
            json!({ "class": self.name, "debug": debug }),
        )?;
        Ok(Box::new(HarnessTask {
            process: self.process.clone(),
        }))
    }
}

struct HarnessTask {
    process: SharedProcess,
}

impl BenchmarkTask for HarnessTask {
    fn goals(&self) -> Result<Vec<Goal>, BoxError> {
        call_as(&self.process, "goals", Value::Null)
    }

    fn all_goals(&self) -> Result<Option<Vec<Goal>>, BoxError> {
        call_as(&self.process, "all_goals", Value::Null)
    }

    fn oracle_max_steps(&self) -> Result<Option<u32>, BoxError> {
        call_as(&self.process, "oracle_max_steps", Value::Null)
    }

    fn oracle(&self, _env: &dyn SimEnv) -> Result<Option<Box<dyn OraclePolicy>>, BoxError> {
        // The harness binds the policy to its own environment handle.
        let available: bool = call_as(&self.process, "oracle", Value::Null)?;
        Ok(available.then(|| {
            Box::new(HarnessPolicy {
                process: self.process.clone(),
            }) as Box<dyn OraclePolicy>
        }))
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

struct HarnessPolicy {
    process: SharedProcess,
}

impl OraclePolicy for HarnessPolicy {
    fn act(&mut self, observation: &Observation) -> Result<Option<Action>, BoxError> {
        call_as(&self.process, "act", json!({ "observation": observation }))
    }
}

struct HarnessEnv {
    process: SharedProcess,
    task: HarnessTask,
    action_space: ActionSpace,
}

impl SimEnv for HarnessEnv {
    fn reset(&mut self) -> Result<Observation, BoxError> {
        Ok(process::call(&self.process, "reset", Value::Null)?)
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome, BoxError> {
        call_as(&self.process, "step", json!({ "action": action }))
    }

    fn close(&mut self) -> Result<(), BoxError> {
        process::call(&self.process, "close", Value::Null)?;
        Ok(())
    }

    fn task(&self) -> &dyn BenchmarkTask {
        &self.task
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn obj_id_reverse_mapping(&self) -> Result<BTreeMap<u32, String>, BoxError> {
        call_as(&self.process, "obj_id_reverse_mapping", Value::Null)
    }
}
