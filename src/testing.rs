//! In-memory fakes shared by unit tests.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::adapters::lexical::LexicalRetriever;
use crate::cassette::config::CassetteConfig;
use crate::context::ServiceContext;
use crate::ports::{
    Action, ActionSpace, BenchmarkTask, BoxError, Clock, EnvConfig, FieldBounds, FileSystem, Goal,
    LoadedNamespace, Observation, OraclePolicy, RegistryEntry, SimEnv, Simulator, StepOutcome,
    TaskClass, TaskLoader, TaskRegistry,
};

/// Smallest task source that satisfies the authoring contract.
pub fn minimal_task_code() -> String {
    r#"# group: rearrangement
from vima_bench.tasks.task_suite.base import BaseTask
import numpy as np


class PlaceBlockInBowl(BaseTask):
    task_name = "place_block_in_bowl"

    def __init__(self, *args, **kwargs):
        super().__init__(
            prompt_template="Put {dragged_obj} into {base_obj}.",
            oracle_max_steps=2,
            *args,
            **kwargs,
        )

    def reset(self, env):
        super().reset(env)
        self.goals.append(
            ([(obj_id, (0, None))], np.ones((1, 1)), [target_pose], False, True, "pose", None, 1.0)
        )
        self._all_goals = self.goals.copy()
"#
    .to_string()
}

/// In-memory filesystem for exercising stores without touching disk.
#[derive(Default)]
pub struct MemFs {
    files: Mutex<HashMap<PathBuf, String>>,
    unreadable: Mutex<Vec<PathBuf>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files.lock().unwrap().insert(path.into(), contents.to_string());
        self
    }

    /// Lists `path` but fails every read of it.
    pub fn with_unreadable(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.files.lock().unwrap().insert(path.clone(), String::new());
        self.unreadable.lock().unwrap().push(path);
        self
    }
}

impl FileSystem for MemFs {
    fn read_to_string(&self, path: &Path) -> Result<String, BoxError> {
        if self.unreadable.lock().unwrap().iter().any(|p| p == path) {
            return Err(format!("Permission denied: {}", path.display()).into());
        }
        let files = self.files.lock().unwrap();
        files.get(path).cloned().ok_or_else(|| format!("File not found: {}", path.display()).into())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), BoxError> {
        self.files.lock().unwrap().insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        files.contains_key(path) || files.keys().any(|k| k.starts_with(path) && k != path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, BoxError> {
        let files = self.files.lock().unwrap();
        let mut names: Vec<String> = files
            .keys()
            .filter(|k| k.parent() == Some(path))
            .filter_map(|k| k.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Fixed list of registry entries.
pub struct FakeRegistry(pub Vec<RegistryEntry>);

impl TaskRegistry for FakeRegistry {
    fn entries(&self) -> Result<Vec<RegistryEntry>, BoxError> {
        Ok(self.0.clone())
    }
}

/// A registry entry with source and docstring filled in.
pub fn registry_entry(full_name: &str, class_name: &str, doc: &str) -> RegistryEntry {
    RegistryEntry {
        full_name: full_name.to_string(),
        class_name: class_name.to_string(),
        module: Some(format!("vima_bench.tasks.task_suite.{class_name}")),
        source: Some(format!("class {class_name}(BaseTask):\n    pass\n")),
        docstring: Some(doc.to_string()),
    }
}

/// Clock frozen at 2026-01-02T03:04:05Z.
pub struct FixedClock;

impl FixedClock {
    pub fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Self::instant()
    }
}

/// Builds a context whose collaborators are all in-memory fakes.
pub fn fake_context(fs: MemFs, registry: FakeRegistry, script: TaskScript) -> ServiceContext {
    let mut ctx = ServiceContext::replaying_from(&CassetteConfig::panic_on_unspecified())
        .expect("panic config should always succeed");
    ctx.clock = Box::new(FixedClock);
    ctx.fs = Box::new(fs);
    ctx.registry = Box::new(registry);
    ctx.loader = Box::new(FakeLoader::new(script));
    ctx.simulator = Box::new(FakeSimulator::default());
    ctx.retriever = Box::new(LexicalRetriever);
    ctx
}

/// How the scripted oracle policy behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedPolicy {
    /// Produces in-range actions.
    Reaching,
    /// Produces actions outside the action space.
    Overshoot,
    /// `oracle(env)` returns `None`.
    Missing,
    /// `act` returns `None`.
    Silent,
}

/// Behaviour script for a fake task class, its instances, and its env.
#[derive(Debug, Clone)]
pub struct TaskScript {
    class_name: String,
    is_task: bool,
    constructor_error: Option<String>,
    reset_error: Option<String>,
    step_error: Option<String>,
    close_error: bool,
    goals: bool,
    snapshot: bool,
    max_steps: Option<u32>,
    steps_to_complete: u32,
    final_info: Value,
    policy: ScriptedPolicy,
}

impl TaskScript {
    pub fn completes_in(steps: u32) -> Self {
        Self {
            class_name: "PlaceBlockInBowl".to_string(),
            is_task: true,
            constructor_error: None,
            reset_error: None,
            step_error: None,
            close_error: false,
            goals: true,
            snapshot: true,
            max_steps: Some(10),
            steps_to_complete: steps,
            final_info: json!({"success": true}),
            policy: ScriptedPolicy::Reaching,
        }
    }

    pub fn class_named(mut self, name: &str) -> Self {
        self.class_name = name.to_string();
        self
    }

    pub fn not_a_task(mut self) -> Self {
        self.is_task = false;
        self
    }

    pub fn constructor_fails(mut self, message: &str) -> Self {
        self.constructor_error = Some(message.to_string());
        self
    }

    pub fn reset_fails(mut self, message: &str) -> Self {
        self.reset_error = Some(message.to_string());
        self
    }

    pub fn step_fails(mut self, message: &str) -> Self {
        self.step_error = Some(message.to_string());
        self
    }

    pub fn close_fails(mut self) -> Self {
        self.close_error = true;
        self
    }

    pub fn no_goals(mut self) -> Self {
        self.goals = false;
        self
    }

    pub fn no_snapshot(mut self) -> Self {
        self.snapshot = false;
        self
    }

    pub fn max_steps(mut self, max_steps: Option<u32>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn final_info(mut self, info: Value) -> Self {
        self.final_info = info;
        self
    }

    pub fn policy(mut self, policy: ScriptedPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Loader that yields one scripted class per load.
pub struct FakeLoader {
    script: TaskScript,
    error: Option<String>,
    pub loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(script: TaskScript) -> Self {
        Self {
            script,
            error: None,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            script: TaskScript::completes_in(1),
            error: Some(message.to_string()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn class_named(mut self, name: &str) -> Self {
        self.script = self.script.class_named(name);
        self
    }
}

impl TaskLoader for FakeLoader {
    fn load(&self, _code: &str) -> Result<LoadedNamespace, BoxError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.error {
            return Err(message.clone().into());
        }
        Ok(LoadedNamespace::new(vec![Box::new(FakeClass(self.script.clone()))]))
    }
}

struct FakeClass(TaskScript);

impl TaskClass for FakeClass {
    fn name(&self) -> &str {
        &self.0.class_name
    }

    fn extends_base_task(&self) -> bool {
        self.0.is_task
    }

    fn instantiate(&self, _debug: bool) -> Result<Box<dyn BenchmarkTask>, BoxError> {
        if let Some(message) = &self.0.constructor_error {
            return Err(message.clone().into());
        }
        Ok(Box::new(FakeTask {
            script: self.0.clone(),
            goals: Vec::new(),
            all_goals: None,
        }))
    }
}

struct FakeTask {
    script: TaskScript,
    goals: Vec<Goal>,
    all_goals: Option<Vec<Goal>>,
}

impl BenchmarkTask for FakeTask {
    fn goals(&self) -> Result<Vec<Goal>, BoxError> {
        Ok(self.goals.clone())
    }

    fn all_goals(&self) -> Result<Option<Vec<Goal>>, BoxError> {
        Ok(self.all_goals.clone())
    }

    fn oracle_max_steps(&self) -> Result<Option<u32>, BoxError> {
        Ok(self.script.max_steps)
    }

    fn oracle(&self, _env: &dyn SimEnv) -> Result<Option<Box<dyn OraclePolicy>>, BoxError> {
        Ok(match self.script.policy {
            ScriptedPolicy::Missing => None,
            kind => Some(Box::new(FakePolicy(kind))),
        })
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

struct FakePolicy(ScriptedPolicy);

impl OraclePolicy for FakePolicy {
    fn act(&mut self, _observation: &Observation) -> Result<Option<Action>, BoxError> {
        let position = match self.0 {
            ScriptedPolicy::Silent | ScriptedPolicy::Missing => return Ok(None),
            ScriptedPolicy::Reaching => vec![0.5, 0.0],
            ScriptedPolicy::Overshoot => vec![1.5, -2.0],
        };
        let mut action = Action::new();
        action.insert("pose0_position".to_string(), position);
        Ok(Some(action))
    }
}

/// Simulator that builds scripted environments and counts teardowns.
#[derive(Default)]
pub struct FakeSimulator {
    error: Option<String>,
    pub closes: Arc<AtomicUsize>,
    pub last_action: Arc<Mutex<Option<Action>>>,
    pub last_config: Mutex<Option<EnvConfig>>,
}

impl FakeSimulator {
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

impl Simulator for FakeSimulator {
    fn make_env(
        &self,
        task: Box<dyn BenchmarkTask>,
        config: &EnvConfig,
    ) -> Result<Box<dyn SimEnv>, BoxError> {
        *self.last_config.lock().unwrap() = Some(config.clone());
        if let Some(message) = &self.error {
            return Err(message.clone().into());
        }
        let task = task
            .into_any()
            .downcast::<FakeTask>()
            .map_err(|_| "task was not produced by FakeLoader")?;
        let mut fields = BTreeMap::new();
        fields.insert(
            "pose0_position".to_string(),
            FieldBounds {
                low: vec![-1.0],
                high: vec![1.0],
            },
        );
        Ok(Box::new(FakeEnv {
            task: *task,
            steps: 0,
            action_space: ActionSpace { fields },
            closes: Arc::clone(&self.closes),
            last_action: Arc::clone(&self.last_action),
        }))
    }
}

struct FakeEnv {
    task: FakeTask,
    steps: u32,
    action_space: ActionSpace,
    closes: Arc<AtomicUsize>,
    last_action: Arc<Mutex<Option<Action>>>,
}

impl SimEnv for FakeEnv {
    fn reset(&mut self) -> Result<Observation, BoxError> {
        if let Some(message) = &self.task.script.reset_error {
            return Err(message.clone().into());
        }
        self.steps = 0;
        if self.task.script.goals {
            self.task.goals = vec![json!({"objs": [5], "metric": "pose"})];
        }
        if self.task.script.snapshot {
            self.task.all_goals = Some(self.task.goals.clone());
        }
        Ok(json!({"rgb": "frame-0"}))
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome, BoxError> {
        *self.last_action.lock().unwrap() = Some(action.clone());
        if let Some(message) = &self.task.script.step_error {
            return Err(message.clone().into());
        }
        self.steps += 1;
        let done = self.steps >= self.task.script.steps_to_complete;
        let info = if done { self.task.script.final_info.clone() } else { json!({}) };
        Ok(StepOutcome {
            observation: json!({"rgb": format!("frame-{}", self.steps)}),
            reward: if done { 1.0 } else { 0.0 },
            done,
            info: info.as_object().cloned().unwrap_or_default(),
        })
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.task.script.close_error {
            return Err("close failed".into());
        }
        Ok(())
    }

    fn task(&self) -> &dyn BenchmarkTask {
        &self.task
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn obj_id_reverse_mapping(&self) -> Result<BTreeMap<u32, String>, BoxError> {
        Ok(BTreeMap::from([(5, "bowl".to_string()), (6, "block".to_string())]))
    }
}
