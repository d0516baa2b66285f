//! Heuristic inspection of task source text.
//!
//! These are regex lints, not a parser. They are good enough to pull
//! metadata out of generated files and to reject obviously broken
//! candidates early; the runtime stages catch what they miss.

use std::sync::LazyLock;

use regex::Regex;

/// File extension of task source files.
pub const TASK_FILE_EXTENSION: &str = "py";

/// Fallback group for generated files without a `# group:` comment.
pub const DEFAULT_GENERATED_GROUP: &str = "generated";

/// Group names the benchmark defines.
pub const RECOMMENDED_GROUPS: [&str; 7] = [
    "instruction_following",
    "constraint_satisfaction",
    "novel_concept_grounding",
    "one_shot_imitation",
    "rearrangement",
    "require_memory",
    "require_reasoning",
];

static CLASS_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid class regex")
});

static TASK_NAME_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"task_name\s*=\s*["']([^"']+)["']"#).expect("valid task_name regex")
});

static GROUP_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#\s*group\s*:\s*([A-Za-z0-9_/\-]+)").expect("valid group regex")
});

static ORACLE_OVERRIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"def\s+oracle\s*\(").expect("valid oracle regex"));

static GOAL_REGISTRATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"self\.goals\.append\s*\(").expect("valid goals regex"));

static GOAL_SNAPSHOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"self\._all_goals\s*=\s*self\.goals\.copy\(\s*\)").expect("valid snapshot regex")
});

/// Name of the first class declared in `code`.
#[must_use]
pub fn class_name(code: &str) -> Option<&str> {
    CLASS_DEF.captures(code).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Value of the first `task_name = "<literal>"` assignment in `code`.
#[must_use]
pub fn task_name_literal(code: &str) -> Option<&str> {
    TASK_NAME_LITERAL.captures(code).and_then(|c| c.get(1)).map(|m| m.as_str().trim())
}

/// Value of a `# group: <value>` line comment in `code`.
#[must_use]
pub fn group_comment(code: &str) -> Option<&str> {
    GROUP_COMMENT.captures(code).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Whether `code` defines its own `oracle` method.
#[must_use]
pub fn overrides_oracle(code: &str) -> bool {
    ORACLE_OVERRIDE.is_match(code)
}

/// Whether `code` registers at least one goal.
#[must_use]
pub fn registers_goal(code: &str) -> bool {
    GOAL_REGISTRATION.is_match(code)
}

/// Whether `code` finalizes its goal list into the `_all_goals` snapshot.
#[must_use]
pub fn finalizes_goals(code: &str) -> bool {
    GOAL_SNAPSHOT.is_match(code)
}

/// Reduces `name` to a safe file stem (`[A-Za-z0-9_-]`, never empty).
#[must_use]
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "generated_task".to_string()
    } else {
        stem
    }
}
