//! One harness child process speaking newline-delimited JSON.
//!
//! Each request is a single line holding a JSON object with an `op` field
//! plus the operation's arguments. Each reply is a single line holding either
//! `{"ok": <value>}` or `{"err": "<message>"}`. Blank lines from the harness
//! are ignored and anything it prints on stderr goes to the terminal.
//!
//! A driver has to answer these operations. Everything after `load` acts on
//! the namespace, task, environment, and policy that the same process built
//! earlier, so a driver only ever holds one of each.
//!
//! | op | arguments | `ok` value |
//! |---|---|---|
//! | `registry` | none | `[{"full_name", "class_name", "module"?, "source"?, "docstring"?}]` |
//! | `load` | `code` | `{"classes": [{"name", "extends_base_task"}]}`, in definition order |
//! | `instantiate` | `class`, `debug` | ignored |
//! | `make_env` | `config` | `{"action_space": {"<field>": {"low": [..], "high": [..]}}}` |
//! | `reset` | none | observation (any JSON) |
//! | `goals` | none | list of goals (any JSON) |
//! | `all_goals` | none | list of goals, or `null` when never snapshotted |
//! | `oracle_max_steps` | none | integer or `null` |
//! | `oracle` | none | `true` if the task produced a policy for the env |
//! | `act` | `observation` | action object keyed by field, or `null` |
//! | `step` | `action` | `{"observation", "reward", "done", "info"}` |
//! | `obj_id_reverse_mapping` | none | `{"<object id>": "<name>"}` |
//! | `close` | none | ignored |
//!
//! For example, a driver receiving `{"op":"oracle_max_steps"}` might answer
//! `{"ok":3}`, and one whose `load` raised answers
//! `{"err":"SyntaxError: invalid syntax (line 3)"}`.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::HarnessError;

/// A harness process shared by every handle created from one load.
pub type SharedProcess = Arc<Mutex<HarnessProcess>>;

/// A running harness process. The child is killed when this is dropped.
pub struct HarnessProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl HarnessProcess {
    /// Starts `command` with piped stdin and stdout. Stderr is inherited so
    /// harness logs reach the terminal.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NotConfigured`] for an empty command, or
    /// [`HarnessError::Spawn`] if the program cannot be started.
    pub fn spawn(command: &[String]) -> Result<Self, HarnessError> {
        let (program, args) = command.split_first().ok_or(HarnessError::NotConfigured)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                command: command.join(" "),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(HarnessError::Protocol {
                op: "spawn".to_string(),
                detail: "child pipes were not captured".to_string(),
            });
        };
        debug!(pid = child.id(), command = %command.join(" "), "harness started");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Spawns and wraps the process for sharing.
    ///
    /// # Errors
    ///
    /// See [`HarnessProcess::spawn`].
    pub fn spawn_shared(command: &[String]) -> Result<SharedProcess, HarnessError> {
        Ok(Arc::new(Mutex::new(Self::spawn(command)?)))
    }

    /// Sends one request and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Remote`] with the harness's message when it
    /// answers `err`, and protocol or I/O errors otherwise.
    pub fn call(&mut self, op: &str, args: Value) -> Result<Value, HarnessError> {
        let request = encode_request(op, args)?;
        trace!(op, "harness request");
        writeln!(self.stdin, "{request}")?;
        self.stdin.flush()?;

        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(HarnessError::Closed(op.to_string()));
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        decode_reply(op, line.trim())
    }
}

impl Drop for HarnessProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        debug!(pid = self.child.id(), "harness stopped");
    }
}

/// Locks `process` and issues one call.
///
/// # Errors
///
/// Returns [`HarnessError::Closed`] if an earlier holder panicked mid-call,
/// otherwise whatever [`HarnessProcess::call`] returns.
pub fn call(process: &SharedProcess, op: &str, args: Value) -> Result<Value, HarnessError> {
    let mut guard = process.lock().map_err(|_| HarnessError::Closed(op.to_string()))?;
    guard.call(op, args)
}

fn encode_request(op: &str, args: Value) -> Result<String, HarnessError> {
    let mut object = match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(HarnessError::Protocol {
                op: op.to_string(),
                detail: format!("request arguments must be an object, got {other}"),
            })
        }
    };
    object.insert("op".to_string(), Value::String(op.to_string()));
    Ok(Value::Object(object).to_string())
}

fn decode_reply(op: &str, line: &str) -> Result<Value, HarnessError> {
    let protocol = |detail: String| HarnessError::Protocol {
        op: op.to_string(),
        detail,
    };
    let reply: Value = serde_json::from_str(line)
        .map_err(|e| protocol(format!("invalid JSON reply: {e}")))?;
    let Value::Object(mut object) = reply else {
        return Err(protocol(format!("reply is not an object: {line}")));
    };
    if let Some(err) = object.remove("err") {
        let message = match err {
            Value::String(message) => message,
            other => other.to_string(),
        };
        return Err(HarnessError::Remote(message));
    }
    object
        .remove("ok")
        .ok_or_else(|| protocol(format!("reply has neither `ok` nor `err`: {line}")))
}
