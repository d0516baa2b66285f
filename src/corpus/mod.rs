//! Retrieval corpus: builtin benchmark tasks plus previously generated ones.
//!
//! The corpus is rebuilt from scratch at the start of every session and the
//! documents are never mutated afterwards.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::ServiceContext;
use crate::ports::{RegistryEntry, TaskRegistry};
use crate::source::{self, DEFAULT_GENERATED_GROUP, TASK_FILE_EXTENSION};

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Registered with the benchmark.
    Builtin,
    /// Written by an earlier generation run.
    Generated,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Builtin => "builtin",
            Self::Generated => "generated",
        })
    }
}

/// One retrievable task description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    /// `builtin::<group>/<task_name>` or `generated::<file name>`.
    pub id: String,
    /// Source of the document.
    pub origin: Origin,
    /// Task group, e.g. `rearrangement`.
    pub group: String,
    /// Task name within its group.
    pub task_name: String,
    /// Declared class, when known.
    pub class_name: Option<String>,
    /// Defining module; builtin tasks only.
    pub module: Option<String>,
    /// Text handed to the retrieval backend and to prompts.
    pub text: String,
}

/// Splits a registry key `"<group>/<task_name>"` at the first `/`.
///
/// Keys without a slash land in the `unknown` group.
#[must_use]
pub fn split_full_task_name(full_name: &str) -> (&str, &str) {
    full_name.split_once('/').unwrap_or(("unknown", full_name))
}

fn builtin_document(entry: &RegistryEntry) -> TaskDocument {
    let (group, task_name) = split_full_task_name(&entry.full_name);
    let module = entry.module.as_deref().unwrap_or("unknown");
    let text = [
        format!("[BUILTIN TASK] {group}/{task_name} ({})", entry.class_name),
        format!("Module: {module}"),
        String::new(),
        "Docstring:".to_string(),
        entry.docstring.clone().unwrap_or_default(),
        String::new(),
        "Source code:".to_string(),
        entry.source.clone().unwrap_or_default(),
    ]
    .join("\n");
    TaskDocument {
        id: format!("builtin::{group}/{task_name}"),
        origin: Origin::Builtin,
        group: group.to_string(),
        task_name: task_name.to_string(),
        class_name: Some(entry.class_name.clone()),
        module: Some(module.to_string()),
        text,
    }
}

/// Reads every registry entry once.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn registry_entries(registry: &dyn TaskRegistry) -> Result<Vec<RegistryEntry>, String> {
    registry
        .entries()
        .map_err(|e| format!("Failed to read task registry: {e}"))
}

/// One document per registered task, in registry order.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn builtin_documents(registry: &dyn TaskRegistry) -> Result<Vec<TaskDocument>, String> {
    Ok(registry_entries(registry)?
        .iter()
        .map(builtin_document)
        .collect())
}

/// One document per task file in `dir`, in file-name order.
///
/// A missing directory yields no documents; unreadable files are skipped.
#[must_use]
pub fn generated_documents(ctx: &ServiceContext, dir: &Path) -> Vec<TaskDocument> {
    if !ctx.fs.exists(dir) {
        debug!(dir = %dir.display(), "no generated task directory");
        return Vec::new();
    }
    let mut names = match ctx.fs.list_dir(dir) {
        Ok(names) => names,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list generated task directory");
            return Vec::new();
        }
    };
    names.sort();

    let mut docs = Vec::new();
    for name in names {
        let path = dir.join(&name);
        if path.extension().and_then(|e| e.to_str()) != Some(TASK_FILE_EXTENSION) {
            continue;
        }
        let text = match ctx.fs.read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable generated task");
                continue;
            }
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        docs.push(TaskDocument {
            id: format!("generated::{name}"),
            origin: Origin::Generated,
            group: source::group_comment(&text)
                .unwrap_or(DEFAULT_GENERATED_GROUP)
                .to_string(),
            task_name: source::task_name_literal(&text).map_or(stem, str::to_string),
            class_name: source::class_name(&text).map(str::to_string),
            module: None,
            text,
        });
    }
    docs
}

/// Builtin documents followed by generated ones.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn build_corpus(
    ctx: &ServiceContext,
    generated_dir: &Path,
) -> Result<Vec<TaskDocument>, String> {
    let entries = registry_entries(ctx.registry.as_ref())?;
    Ok(corpus_from_entries(ctx, &entries, generated_dir))
}

/// Like [`build_corpus`], over registry entries the caller already read.
#[must_use]
pub fn corpus_from_entries(
    ctx: &ServiceContext,
    entries: &[RegistryEntry],
    generated_dir: &Path,
) -> Vec<TaskDocument> {
    let mut docs: Vec<TaskDocument> = entries.iter().map(builtin_document).collect();
    let builtin = docs.len();
    docs.extend(generated_documents(ctx, generated_dir));
    debug!(builtin, generated = docs.len() - builtin, "corpus built");
    docs
}

/// `(full_name, first docstring line)` for every registered task.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn existing_task_summaries(
    registry: &dyn TaskRegistry,
) -> Result<Vec<(String, String)>, String> {
    Ok(summarize_entries(&registry_entries(registry)?))
}

/// `(full_name, first docstring line)` for each of `entries`.
#[must_use]
pub fn summarize_entries(entries: &[RegistryEntry]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|entry| {
            let first = entry
                .docstring
                .as_deref()
                .and_then(|doc| doc.lines().map(str::trim).find(|l| !l.is_empty()))
                .unwrap_or("")
                .to_string();
            (entry.full_name.clone(), first)
        })
        .collect()
}
