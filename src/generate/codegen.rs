//! Step 2: ask the model for task code, grounded on retrieved examples.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::proposal::TaskProposal;
use crate::context::ServiceContext;
use crate::corpus::TaskDocument;
use crate::error::GenerateError;
use crate::ports::CompletionRequest;

const MAX_TOKENS: u32 = 4096;

static PYTHON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```python(.*?)```").expect("valid regex"));
static ANY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid regex"));

/// Canonical task layout the model fills in. The goal scaffold and the
/// `_all_goals` snapshot are what the verifier checks for.
pub const TASK_SKELETON: &str = r#"```python
class TEMPLATE_Task(BaseTask):
    task_name = "<TO_FILL_TASK_NAME>"

    def __init__(self, *args, **kwargs):
        # TODO: fill prompt_template, task_meta, placeholder_expression, oracle_max_steps
        prompt_template = "..."
        task_meta = {...}
        placeholder_expression = {...}
        oracle_max_steps = 3
        super().__init__(
            prompt_template=prompt_template,
            task_meta=task_meta,
            placeholder_expression=placeholder_expression,
            oracle_max_steps=oracle_max_steps,
            *args,
            **kwargs,
        )

    def reset(self, env):
        super().reset(env)
        # TODO: sample objects with ObjPedia / TexturePedia and add them with
        # self.add_object_to_env(env, obj_entry, tex_entry, size, category="rigid")
        #
        # REQUIRED goals scaffold (keep the structure, fill the ... parts):
        #   self.goals.append((
        #       [(obj_id, (obj_entry.symmetry, None))],  # objs
        #       np.ones((1, 1)),                         # matches
        #       [target_pose],                           # targs
        #       False,                                   # replace
        #       True,                                    # rotations
        #       "pose",                                  # metric
        #       None,                                    # params
        #       1.0,                                     # max_progress
        #   ))
        #   self._all_goals = self.goals.copy()

    def check_success(self, *args, **kwargs) -> ResultTuple:
        # TODO: implement using self.goals and env state
        ...
```"#;

/// System prompt carrying the API reference, the task skeleton, and the
/// authoring rules the verifier enforces.
#[must_use]
pub fn system_prompt(api_reference: &str) -> String {
    let mut prompt = String::from(
        "You are an expert in the VIMA-Bench codebase.\n\n\
         You MUST use ONLY the imports and tools listed in the API reference.\n\n",
    );
    if !api_reference.trim().is_empty() {
        prompt.push_str(api_reference.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str(
        "Follow this canonical skeleton closely. Only fill the TODO sections and \
         do not remove required lines like self._all_goals = self.goals.copy():\n\n",
    );
    prompt.push_str(TASK_SKELETON);
    prompt.push_str(
        "\n\nImplement a NEW task class for the given task name and description:\n\
         - Subclass BaseTask (or a specialized base such as RotateTheObjBase).\n\
         - Define the class attribute task_name = \"<task_name>\" (snake_case).\n\
         - Implement __init__ calling super().__init__(prompt_template=..., \
         task_meta=..., placeholder_expression=..., oracle_max_steps=...).\n\
         - In reset(self, env), append a goal tuple to self.goals following the \
         scaffold and then call self._all_goals = self.goals.copy().\n\
         - Implement check_success returning (success, failure, ...).\n\
         - Do NOT override oracle(); always inherit BaseTask.oracle.\n\
         - The first line may be a comment: # group: <group_name>\n\n\
         Output ONLY a Python code block (```python ... ```).",
    );
    prompt
}

/// User prompt with the brief, the failure block, and the retrieved examples.
#[must_use]
pub fn codegen_prompt(
    proposal: &TaskProposal,
    examples: &[TaskDocument],
    past_failures: &str,
) -> String {
    let mut prompt = format!("New task to implement:\n{}\n", proposal.brief());
    if !past_failures.is_empty() {
        prompt.push_str(&format!(
            "\n{past_failures}\n\nAvoid the above errors in your new code.\n"
        ));
    }
    let context = examples
        .iter()
        .map(|doc| {
            format!(
                "=== Example: {}/{} ({}) ===\n{}",
                doc.group,
                doc.task_name,
                doc.class_name.as_deref().unwrap_or("unknown"),
                doc.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    prompt.push_str(&format!(
        "\nExample tasks for reference:\n{context}\n\n\
         Generate the Python class for this task. Output only a ```python ... ``` block."
    ));
    prompt
}

/// Pulls the code out of the first fenced block, preferring a `python` one.
///
/// # Errors
///
/// Returns [`GenerateError::NoCodeBlock`] if the reply has no fenced block.
pub fn extract_code_block(reply: &str) -> Result<String, GenerateError> {
    PYTHON_BLOCK
        .captures(reply)
        .or_else(|| ANY_BLOCK.captures(reply))
        .map(|caps| caps[1].trim().to_string())
        .ok_or_else(|| GenerateError::NoCodeBlock {
            reply: reply.to_string(),
        })
}

/// Asks the model for code implementing `proposal`.
///
/// # Errors
///
/// Returns [`GenerateError::Llm`] if the call fails or
/// [`GenerateError::NoCodeBlock`] if the reply carries no code.
pub async fn generate_code(
    ctx: &ServiceContext,
    model: &str,
    temperature: Option<f32>,
    api_reference: &str,
    proposal: &TaskProposal,
    examples: &[TaskDocument],
    past_failures: &str,
) -> Result<String, GenerateError> {
    let request = CompletionRequest {
        model: model.to_string(),
        system: Some(system_prompt(api_reference)),
        prompt: codegen_prompt(proposal, examples, past_failures),
        max_tokens: MAX_TOKENS,
        temperature,
    };
    let response = ctx
        .llm
        .complete(&request)
        .await
        .map_err(|source| GenerateError::Llm {
            step: "codegen",
            source,
        })?;
    debug!(completion_tokens = response.completion_tokens, "codegen reply");
    extract_code_block(&response.text)
}
