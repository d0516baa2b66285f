//! Step 1: ask the model for a new task name, group, and description.

use std::fmt::Write as _;

use tracing::debug;

use crate::context::ServiceContext;
use crate::error::GenerateError;
use crate::ports::CompletionRequest;
use crate::source::RECOMMENDED_GROUPS;

/// Name used when the reply declares none.
pub const DEFAULT_TASK_NAME: &str = "generated_task";

/// Group used when the reply declares none.
pub const DEFAULT_GROUP: &str = "instruction_following";

/// Reply prefix kept as the description when none is declared.
const DESCRIPTION_FALLBACK_CHARS: usize = 200;

const MAX_TOKENS: u32 = 512;

/// A proposed task, before any code exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProposal {
    /// Snake-case task name.
    pub task_name: String,
    /// Benchmark group.
    pub group: String,
    /// One or two sentences describing the task.
    pub description: String,
}

impl TaskProposal {
    /// The brief used as the retrieval query and in the code prompt.
    #[must_use]
    pub fn brief(&self) -> String {
        format!(
            "task_name: {}\ngroup: {}\ntask_description: {}",
            self.task_name, self.group, self.description
        )
    }
}

fn system_prompt() -> String {
    format!(
        "You are an expert in the VIMA-Bench task suite.\n\n\
         Given the EXISTING tasks below, propose ONE new task with a unique snake_case \
         task_name, a one- or two-sentence description, and one of these groups: {}.\n\n\
         Output exactly:\n\
         TASK_NAME: <snake_case_name>\n\
         GROUP: <group>\n\
         TASK_DESCRIPTION: <one or two sentences>",
        RECOMMENDED_GROUPS.join(", ")
    )
}

/// Builds the user prompt listing existing tasks and the optional hint.
#[must_use]
pub fn proposal_prompt(existing: &[(String, String)], hint: Option<&str>) -> String {
    let mut prompt = String::from("Existing VIMA-Bench tasks (do not duplicate these names):\n");
    for (name, doc) in existing {
        let doc = if doc.is_empty() { "(no doc)" } else { doc };
        let _ = writeln!(prompt, "- {name}: {doc}");
    }
    if let Some(hint) = hint.filter(|h| !h.trim().is_empty()) {
        let _ = writeln!(prompt, "\nUser hint for the new task: {hint}");
    }
    prompt.push_str("\nPropose one new task (TASK_NAME, GROUP, TASK_DESCRIPTION):");
    prompt
}

/// Parses `TASK_NAME:` / `GROUP:` / `TASK_DESCRIPTION:` lines.
///
/// Keys are case-insensitive and the last occurrence wins. Missing or empty
/// values fall back to [`DEFAULT_TASK_NAME`], [`DEFAULT_GROUP`], and the
/// first 200 characters of the reply.
#[must_use]
pub fn parse_proposal(reply: &str) -> TaskProposal {
    let mut task_name = String::new();
    let mut group = String::new();
    let mut description = String::new();
    for line in reply.trim().lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else { continue };
        let value = value.trim().to_string();
        match key.trim().to_ascii_uppercase().as_str() {
            "TASK_NAME" => task_name = value,
            "GROUP" => group = value,
            "TASK_DESCRIPTION" => description = value,
            _ => {}
        }
    }
    if task_name.is_empty() {
        task_name = DEFAULT_TASK_NAME.to_string();
    }
    if group.is_empty() {
        group = DEFAULT_GROUP.to_string();
    }
    if description.is_empty() {
        description = reply.chars().take(DESCRIPTION_FALLBACK_CHARS).collect();
    }
    TaskProposal {
        task_name,
        group,
        description,
    }
}

/// Asks the model for a proposal.
///
/// # Errors
///
/// Returns [`GenerateError::Llm`] if the completion call fails.
pub async fn propose(
    ctx: &ServiceContext,
    model: &str,
    temperature: Option<f32>,
    existing: &[(String, String)],
    hint: Option<&str>,
) -> Result<TaskProposal, GenerateError> {
    let request = CompletionRequest {
        model: model.to_string(),
        system: Some(system_prompt()),
        prompt: proposal_prompt(existing, hint),
        max_tokens: MAX_TOKENS,
        temperature,
    };
    let response = ctx
        .llm
        .complete(&request)
        .await
        .map_err(|source| GenerateError::Llm {
            step: "proposal",
            source,
        })?;
    debug!(
        prompt_tokens = response.prompt_tokens,
        completion_tokens = response.completion_tokens,
        "proposal reply"
    );
    Ok(parse_proposal(&response.text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_fields_case_insensitively() {
        let reply = "Sure!\ntask_name: stack_three_blocks\nGroup: rearrangement\n\
                     TASK_DESCRIPTION: Stack the three blocks: red on top.\n";
        let proposal = parse_proposal(reply);
        assert_eq!(proposal.task_name, "stack_three_blocks");
        assert_eq!(proposal.group, "rearrangement");
        assert_eq!(proposal.description, "Stack the three blocks: red on top.");
    }

    #[test]
    fn defaults_when_nothing_parses() {
        let reply = "x".repeat(300);
        let proposal = parse_proposal(&reply);
        assert_eq!(proposal.task_name, DEFAULT_TASK_NAME);
        assert_eq!(proposal.group, DEFAULT_GROUP);
        assert_eq!(proposal.description, "x".repeat(200));
    }

    #[test]
    fn empty_values_fall_back() {
        let proposal = parse_proposal("TASK_NAME:\nGROUP:   \nTASK_DESCRIPTION: Sort by color.");
        assert_eq!(proposal.task_name, DEFAULT_TASK_NAME);
        assert_eq!(proposal.group, DEFAULT_GROUP);
        assert_eq!(proposal.description, "Sort by color.");
    }

    #[test]
    fn brief_lists_the_three_fields() {
        let proposal = TaskProposal {
            task_name: "t".to_string(),
            group: "g".to_string(),
            description: "d".to_string(),
        };
        assert_eq!(proposal.brief(), "task_name: t\ngroup: g\ntask_description: d");
    }

    #[test]
    fn prompt_lists_existing_tasks_and_hint() {
        let existing = vec![
            ("rearrangement/rearrange".to_string(), "Rearrange objects.".to_string()),
            ("a/b".to_string(), String::new()),
        ];
        let prompt = proposal_prompt(&existing, Some("something with bowls"));
        assert!(prompt.contains("- rearrangement/rearrange: Rearrange objects.\n"));
        assert!(prompt.contains("- a/b: (no doc)\n"));
        assert!(prompt.contains("User hint for the new task: something with bowls"));

        let prompt = proposal_prompt(&existing, Some("  "));
        assert!(!prompt.contains("User hint"));
    }

    #[test]
    fn system_prompt_names_every_group() {
        let prompt = system_prompt();
        for group in RECOMMENDED_GROUPS {
            assert!(prompt.contains(group));
        }
    }
}
