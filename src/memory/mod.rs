//! Failure memory: a bounded log of rejected generations.
//!
//! Records live in a single JSON array on disk, oldest first. Every append
//! rewrites the whole file, so the store is only safe for one writer at a
//! time. Reads are lenient: anything that does not decode is treated as an
//! empty history rather than an error, so a damaged file never blocks a
//! generation run. Array entries that do not decode are left on disk
//! untouched and still count towards the retention bound.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::ServiceContext;
use crate::verify::Stage;

/// Most records kept on disk.
pub const MAX_ENTRIES: usize = 25;

/// Most source lines kept per record.
pub const CODE_SNIPPET_LINES: usize = 35;

/// Most records injected into a prompt.
pub const PROMPT_ENTRIES: usize = 15;

/// Error text longer than this is cut in the prompt rendering.
pub const ERROR_PREVIEW_CHARS: usize = 500;

const TRUNCATION_MARKER: &str = "# ... (truncated)";

/// One rejected generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Declared task name; empty when none could be determined.
    #[serde(default)]
    pub task_name: String,
    /// Verification stage that rejected the code.
    #[serde(rename = "failed_step")]
    pub failed_stage: Stage,
    /// Trimmed diagnostic.
    #[serde(default)]
    pub error: String,
    /// Leading lines of the rejected code.
    #[serde(default)]
    pub code_snippet: String,
    /// When the failure was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl FailureRecord {
    /// Builds a record, trimming `error` and cutting `code` to
    /// [`CODE_SNIPPET_LINES`] lines.
    #[must_use]
    pub fn new(task_name: &str, failed_stage: Stage, error: &str, code: &str) -> Self {
        Self {
            task_name: task_name.to_string(),
            failed_stage,
            error: error.trim().to_string(),
            code_snippet: snippet(code),
            recorded_at: None,
        }
    }

    /// Sets the recording time.
    #[must_use]
    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    fn stanza(&self, index: usize) -> String {
        let mut error: String = self.error.chars().take(ERROR_PREVIEW_CHARS).collect();
        if self.error.chars().count() > ERROR_PREVIEW_CHARS {
            error.push_str("...");
        }
        format!(
            "--- Failure #{index} (task_name={}, failed at Step {}) ---\n\
             Error: {error}\nCode snippet:\n{}\n",
            self.task_name,
            self.failed_stage.number(),
            self.code_snippet,
        )
    }
}

fn snippet(code: &str) -> String {
    let lines: Vec<&str> = code.trim().lines().collect();
    let mut out = lines.iter().take(CODE_SNIPPET_LINES).copied().collect::<Vec<_>>().join("\n");
    if lines.len() > CODE_SNIPPET_LINES {
        out.push('\n');
        out.push_str(TRUNCATION_MARKER);
    }
    out
}

/// Bounded, file-backed failure history.
///
/// All I/O goes through `ctx.fs`.
pub struct FailureStore<'a> {
    ctx: &'a ServiceContext,
    path: PathBuf,
    max_entries: usize,
}

impl<'a> FailureStore<'a> {
    /// Creates a store backed by the JSON file at `path`.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, path: &Path) -> Self {
        Self {
            ctx,
            path: path.to_path_buf(),
            max_entries: MAX_ENTRIES,
        }
    }

    /// Overrides the retention bound.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every decodable record, oldest first.
    ///
    /// Never fails: a missing, unreadable, or malformed file yields an empty
    /// list, and array entries that do not decode are skipped.
    #[must_use]
    pub fn load(&self) -> Vec<FailureRecord> {
        let entries = self.load_entries();
        let total = entries.len();
        let records: Vec<FailureRecord> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(error = %e, "skipping undecodable failure record");
                    None
                }
            })
            .collect();
        if records.len() < total {
            warn!(
                path = %self.path.display(),
                skipped = total - records.len(),
                "failure store has undecodable entries; leaving them in place"
            );
        }
        records
    }

    /// Raw array entries, oldest first.
    fn load_entries(&self) -> Vec<Value> {
        if !self.ctx.fs.exists(&self.path) {
            return Vec::new();
        }
        let contents = match self.ctx.fs.read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failure store unreadable; treating as empty"
                );
                return Vec::new();
            }
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Array(entries)) => entries,
            _ => {
                warn!(
                    path = %self.path.display(),
                    "failure store is not a JSON array; treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Appends `record`, evicting the oldest entries beyond the bound, and
    /// rewrites the file. Entries this version cannot decode are written
    /// back unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn append(&self, record: FailureRecord) -> Result<(), String> {
        let mut entries = self.load_entries();
        entries.push(
            serde_json::to_value(&record)
                .map_err(|e| format!("Failed to serialize failure record: {e}"))?,
        );
        if entries.len() > self.max_entries {
            entries.drain(..entries.len() - self.max_entries);
        }
        self.write(&entries)
    }

    /// Removes every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn clear(&self) -> Result<(), String> {
        self.write(&[])
    }

    /// Renders the newest records as a prompt block, or `""` when the
    /// store is empty.
    #[must_use]
    pub fn render_for_prompt(&self) -> String {
        render(&self.load())
    }

    fn write(&self, entries: &[Value]) -> Result<(), String> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| format!("Failed to serialize failure records: {e}"))?;
        self.ctx
            .fs
            .write(&self.path, &json)
            .map_err(|e| format!("Failed to write failure store {}: {e}", self.path.display()))
    }
}

/// Renders `records` (oldest first) for injection into a generation prompt.
#[must_use]
pub fn render(records: &[FailureRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }
    let recent = &records[records.len().saturating_sub(PROMPT_ENTRIES)..];
    let mut out = String::from(
        "========== Past failures (avoid similar mistakes) ==========\n\
         The following generated code failed verification. Do NOT repeat these errors.\n\n",
    );
    for (i, record) in recent.iter().enumerate() {
        out.push_str(&record.stanza(i + 1));
        out.push('\n');
    }
    out.push_str("========== End of past failures ==========");
    out
}
