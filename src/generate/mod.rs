//! The generation loop: propose, retrieve, generate, verify, remember.
//!
//! ```text
//! corpus ─> index ──┐
//!                   v
//! propose ─> retrieve ─> generate ─> verify ─┬─ pass ─> save (optional)
//!                            ^               └─ fail ─> failure store
//!                            └────── failure block ─────────┘
//! ```
//!
//! Collaborator errors skip only the candidate they occur in; verification
//! failures are recorded and fed into later prompts of the same run.

pub mod codegen;
pub mod proposal;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::context::ServiceContext;
use crate::corpus::{corpus_from_entries, registry_entries, summarize_entries};
use crate::error::GenerateError;
use crate::memory::{FailureRecord, FailureStore};
use crate::ports::{EnvConfig, RetrievalIndex};
use crate::source::{self, TASK_FILE_EXTENSION};
use crate::verify::{Stage, Verdict, Verifier};

pub use proposal::TaskProposal;

/// Lines of generated code echoed to the console.
const PREVIEW_LINES: usize = 40;

/// Knobs for one generation run.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Optional direction for the proposal step.
    pub brief: Option<String>,
    /// Number of candidates to attempt.
    pub candidates: usize,
    /// Documents retrieved per candidate.
    pub top_k: usize,
    /// Whether to write passing code into `generated_dir`.
    pub save: bool,
    /// Model identifier passed to the LLM port.
    pub model: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Directory of previously generated tasks; also the save target.
    pub generated_dir: PathBuf,
    /// Failure store file.
    pub failure_store: PathBuf,
    /// Optional API reference text file injected into the code prompt.
    pub api_reference: Option<PathBuf>,
    /// Environment settings for verification.
    pub env_config: EnvConfig,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            brief: None,
            candidates: 1,
            top_k: 5,
            save: false,
            model: "gpt-4.1-mini".to_string(),
            temperature: Some(0.7),
            generated_dir: PathBuf::from(".taskgen/generated_tasks"),
            failure_store: PathBuf::from(".taskgen/failed_generations.json"),
            api_reference: None,
            env_config: EnvConfig::default(),
        }
    }
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Verification passed.
    Passed {
        /// Proposed task name.
        task_name: String,
        /// Where the code was written, if it was.
        saved_to: Option<PathBuf>,
    },
    /// Verification failed; the failure was offered to the store.
    Failed {
        /// Proposed task name.
        task_name: String,
        /// Failing stage.
        stage: Stage,
        /// Diagnostic.
        message: String,
    },
    /// A collaborator error ended the candidate before verification.
    Skipped {
        /// The error text.
        reason: String,
    },
}

/// Outcomes of a run, in candidate order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// One entry per candidate.
    pub outcomes: Vec<CandidateOutcome>,
}

impl RunSummary {
    /// Candidates that passed verification.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CandidateOutcome::Passed { .. }))
            .count()
    }

    /// Candidates that failed verification.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CandidateOutcome::Failed { .. }))
            .count()
    }

    /// Candidates skipped by collaborator errors.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CandidateOutcome::Skipped { .. }))
            .count()
    }
}

/// Per-run state built once before the first candidate.
struct Session<'a> {
    ctx: &'a ServiceContext,
    settings: &'a GenerationSettings,
    index: Box<dyn RetrievalIndex>,
    existing: Vec<(String, String)>,
    api_reference: String,
}

struct Attempt {
    proposal: TaskProposal,
    code: String,
}

impl Session<'_> {
    async fn attempt(&self, past_failures: &str) -> Result<Attempt, GenerateError> {
        let settings = self.settings;

        println!("Step 1: proposing task name and description...");
        let proposal = proposal::propose(
            self.ctx,
            &settings.model,
            settings.temperature,
            &self.existing,
            settings.brief.as_deref(),
        )
        .await?;
        println!("Proposal: task_name={}, group={}", proposal.task_name, proposal.group);
        println!("Description: {}", proposal.description);

        let examples = self
            .index
            .retrieve(&proposal.brief(), settings.top_k)
            .await
            .map_err(GenerateError::Retrieval)?;
        info!(task = %proposal.task_name, examples = examples.len(), "retrieved examples");

        println!("Step 2: generating code...");
        let code = codegen::generate_code(
            self.ctx,
            &settings.model,
            settings.temperature,
            &self.api_reference,
            &proposal,
            &examples,
            past_failures,
        )
        .await?;
        Ok(Attempt { proposal, code })
    }
}

/// Runs `settings.candidates` generate-and-verify iterations.
///
/// # Errors
///
/// Returns an error only when the run cannot start: the task registry is
/// unreadable or the retrieval index cannot be built. Per-candidate
/// problems are reported in the summary.
pub async fn run(
    ctx: &ServiceContext,
    settings: &GenerationSettings,
) -> Result<RunSummary, String> {
    println!("Building task corpus (builtin + generated)...");
    let entries = registry_entries(ctx.registry.as_ref())?;
    let corpus = corpus_from_entries(ctx, &entries, &settings.generated_dir);
    let index = ctx
        .retriever
        .build_index(&corpus)
        .await
        .map_err(|e| format!("Failed to build retrieval index: {e}"))?;
    let session = Session {
        ctx,
        settings,
        index,
        existing: summarize_entries(&entries),
        api_reference: load_api_reference(ctx, settings.api_reference.as_deref()),
    };
    info!(
        documents = corpus.len(),
        candidates = settings.candidates,
        "generation run started"
    );

    let store = FailureStore::new(ctx, &settings.failure_store);
    let mut past_failures = store.render_for_prompt();
    let verifier = Verifier::from_context(ctx).with_env_config(settings.env_config.clone());
    let mut summary = RunSummary::default();

    for i in 0..settings.candidates {
        println!("\n========== Candidate #{} ==========", i + 1);
        let Attempt { proposal, code } = match session.attempt(&past_failures).await {
            Ok(attempt) => attempt,
            Err(e) => {
                warn!(candidate = i + 1, error = %e, "candidate skipped");
                println!("Candidate skipped: {e}");
                summary.outcomes.push(CandidateOutcome::Skipped {
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let declared = source::task_name_literal(&code).unwrap_or(proposal.task_name.as_str());
        println!("Generated task_name: {declared}");
        println!("\n----- code preview (first {PREVIEW_LINES} lines) -----");
        for line in code.lines().take(PREVIEW_LINES) {
            println!("{line}");
        }
        println!("----- end of preview -----\n");

        let outcome = match verifier.verify(&code) {
            Verdict::Pass => {
                println!("Verification: PASSED");
                let saved_to = if settings.save {
                    save_passing(ctx, &code, &settings.generated_dir)
                } else {
                    None
                };
                CandidateOutcome::Passed {
                    task_name: proposal.task_name,
                    saved_to,
                }
            }
            Verdict::Fail { stage, message } => {
                println!("Verification: FAILED at {stage}: {message}");
                let record = FailureRecord::new(&proposal.task_name, stage, &message, &code)
                    .recorded_at(ctx.clock.now());
                match store.append(record) {
                    Ok(()) => {
                        println!("Recorded failure in {}", store.path().display());
                        past_failures = store.render_for_prompt();
                    }
                    Err(e) => warn!(error = %e, "could not record failure"),
                }
                CandidateOutcome::Failed {
                    task_name: proposal.task_name,
                    stage,
                    message,
                }
            }
        };
        summary.outcomes.push(outcome);
    }

    info!(
        passed = summary.passed(),
        failed = summary.failed(),
        skipped = summary.skipped(),
        "generation run finished"
    );
    Ok(summary)
}

fn save_passing(ctx: &ServiceContext, code: &str, dir: &Path) -> Option<PathBuf> {
    match save_task_code(ctx, code, dir) {
        Ok(path) => {
            println!("Saved to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, "could not save passing task");
            println!("Verification passed but saving failed: {e}");
            None
        }
    }
}

/// Writes `code` to `<dir>/<task_name>.py`, naming the file after the
/// declared `task_name` literal.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn save_task_code(ctx: &ServiceContext, code: &str, dir: &Path) -> Result<PathBuf, String> {
    let stem =
        source::file_stem(source::task_name_literal(code).unwrap_or(proposal::DEFAULT_TASK_NAME));
    let path = dir.join(format!("{stem}.{TASK_FILE_EXTENSION}"));
    ctx.fs
        .write(&path, code)
        .map_err(|e| format!("Failed to write task file {}: {e}", path.display()))?;
    Ok(path)
}

fn load_api_reference(ctx: &ServiceContext, path: Option<&Path>) -> String {
    let Some(path) = path else { return String::new() };
    match ctx.fs.read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "API reference unavailable; continuing without it"
            );
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::ports::{
        BoxError, CompletionFuture, CompletionRequest, CompletionResponse, LlmClient, RegistryEntry,
        TaskRegistry,
    };
    use crate::testing::{
        fake_context, minimal_task_code, registry_entry, FakeRegistry, FixedClock, MemFs,
        TaskScript,
    };

    /// Serves canned replies in order and remembers every prompt.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, String>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, String>>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let prompts = Arc::new(Mutex::new(Vec::new()));
            let llm = Self {
                replies: Mutex::new(replies.into()),
                prompts: Arc::clone(&prompts),
            };
            (llm, prompts)
        }
    }

    impl LlmClient for ScriptedLlm {
        fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let reply = self.replies.lock().unwrap().pop_front().expect("unexpected LLM call");
            Box::pin(async move {
                reply
                    .map(|text| CompletionResponse {
                        text,
                        prompt_tokens: 10,
                        completion_tokens: 20,
                    })
                    .map_err(BoxError::from)
            })
        }
    }

    const PROPOSAL: &str = "TASK_NAME: place_block_in_bowl\nGROUP: rearrangement\n\
                            TASK_DESCRIPTION: Put the block in the bowl.";

    fn fenced(code: &str) -> String {
        format!("```python\n{code}\n```")
    }

    fn settings() -> GenerationSettings {
        GenerationSettings {
            generated_dir: PathBuf::from("/work/gen"),
            failure_store: PathBuf::from("/work/failed.json"),
            ..GenerationSettings::default()
        }
    }

    fn context(
        script: TaskScript,
        replies: Vec<Result<String, String>>,
    ) -> (ServiceContext, Arc<Mutex<Vec<String>>>) {
        let registry = FakeRegistry(vec![registry_entry(
            "rearrangement/rearrange",
            "Rearrange",
            "Rearrange objects to match a scene.",
        )]);
        let mut ctx = fake_context(MemFs::new(), registry, script);
        let (llm, prompts) = ScriptedLlm::new(replies);
        ctx.llm = Box::new(llm);
        (ctx, prompts)
    }

    #[tokio::test]
    async fn passing_candidate_is_saved_under_its_task_name() {
        let (ctx, prompts) = context(
            TaskScript::completes_in(2),
            vec![Ok(PROPOSAL.into()), Ok(fenced(&minimal_task_code()))],
        );
        let settings = GenerationSettings {
            save: true,
            ..settings()
        };
        let summary = run(&ctx, &settings).await.unwrap();

        let saved = PathBuf::from("/work/gen/place_block_in_bowl.py");
        assert_eq!(
            summary.outcomes,
            vec![CandidateOutcome::Passed {
                task_name: "place_block_in_bowl".into(),
                saved_to: Some(saved.clone()),
            }]
        );
        assert_eq!(ctx.fs.read_to_string(&saved).unwrap(), minimal_task_code().trim());

        let prompts = prompts.lock().unwrap();
        assert!(prompts[0]
            .contains("- rearrangement/rearrange: Rearrange objects to match a scene."));
        assert!(prompts[1].contains("=== Example: rearrangement/rearrange (Rearrange) ==="));
        assert!(!prompts[1].contains("Past failures"));
    }

    #[tokio::test]
    async fn passing_candidate_is_not_saved_without_flag() {
        let (ctx, _) = context(
            TaskScript::completes_in(1),
            vec![Ok(PROPOSAL.into()), Ok(fenced(&minimal_task_code()))],
        );
        let summary = run(&ctx, &settings()).await.unwrap();
        assert_eq!(
            summary.outcomes,
            vec![CandidateOutcome::Passed {
                task_name: "place_block_in_bowl".into(),
                saved_to: None,
            }]
        );
        assert!(!ctx.fs.exists(Path::new("/work/gen")));
    }

    #[tokio::test]
    async fn failure_is_recorded_and_fed_to_the_next_candidate() {
        let (ctx, prompts) = context(
            TaskScript::completes_in(1).no_goals(),
            vec![
                Ok(PROPOSAL.into()),
                Ok(fenced(&minimal_task_code())),
                Ok(PROPOSAL.into()),
                Ok(fenced(&minimal_task_code())),
            ],
        );
        let settings = GenerationSettings {
            candidates: 2,
            save: true,
            ..settings()
        };
        let summary = run(&ctx, &settings).await.unwrap();

        assert_eq!(summary.failed(), 2);
        assert!(!ctx.fs.exists(Path::new("/work/gen/place_block_in_bowl.py")));

        let store = FailureStore::new(&ctx, Path::new("/work/failed.json"));
        let records = store.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].task_name, "place_block_in_bowl");
        assert_eq!(records[0].failed_stage, Stage::Runtime);
        assert_eq!(records[0].recorded_at, Some(FixedClock::instant()));

        let prompts = prompts.lock().unwrap();
        assert!(!prompts[1].contains("Past failures"));
        assert!(prompts[3]
            .contains("--- Failure #1 (task_name=place_block_in_bowl, failed at Step 2) ---"));
    }

    #[tokio::test]
    async fn collaborator_errors_skip_only_their_candidate() {
        let (ctx, _) = context(
            TaskScript::completes_in(1),
            vec![
                Err("rate limited".into()),
                Ok(PROPOSAL.into()),
                Ok("I cannot write code today.".into()),
                Ok(PROPOSAL.into()),
                Ok(fenced(&minimal_task_code())),
            ],
        );
        let settings = GenerationSettings {
            candidates: 3,
            ..settings()
        };
        let summary = run(&ctx, &settings).await.unwrap();

        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.passed(), 1);
        match &summary.outcomes[0] {
            CandidateOutcome::Skipped { reason } => {
                assert!(reason.contains("LLM proposal call failed: rate limited"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match &summary.outcomes[1] {
            CandidateOutcome::Skipped { reason } => assert!(reason.contains("no code block")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(FailureStore::new(&ctx, Path::new("/work/failed.json")).load().is_empty());
    }

    #[tokio::test]
    async fn existing_failures_reach_the_first_prompt() {
        let (ctx, prompts) = context(
            TaskScript::completes_in(1),
            vec![Ok(PROPOSAL.into()), Ok(fenced(&minimal_task_code()))],
        );
        FailureStore::new(&ctx, Path::new("/work/failed.json"))
            .append(FailureRecord::new("old_task", Stage::Structural, "bad lint", "x = 1"))
            .unwrap();

        run(&ctx, &settings()).await.unwrap();
        assert!(prompts.lock().unwrap()[1].contains("task_name=old_task, failed at Step 1"));
    }

    /// Counts `entries` calls; each one costs a harness process when live.
    struct CountingRegistry {
        inner: FakeRegistry,
        reads: Arc<AtomicUsize>,
    }

    impl TaskRegistry for CountingRegistry {
        fn entries(&self) -> Result<Vec<RegistryEntry>, BoxError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.entries()
        }
    }

    #[tokio::test]
    async fn registry_is_read_once_per_run() {
        let (mut ctx, prompts) = context(
            TaskScript::completes_in(1),
            vec![
                Ok(PROPOSAL.into()),
                Ok(fenced(&minimal_task_code())),
                Ok(PROPOSAL.into()),
                Ok(fenced(&minimal_task_code())),
            ],
        );
        let reads = Arc::new(AtomicUsize::new(0));
        ctx.registry = Box::new(CountingRegistry {
            inner: FakeRegistry(vec![registry_entry(
                "rearrangement/rearrange",
                "Rearrange",
                "Rearrange objects to match a scene.",
            )]),
            reads: Arc::clone(&reads),
        });

        let settings = GenerationSettings {
            candidates: 2,
            ..settings()
        };
        let summary = run(&ctx, &settings).await.unwrap();
        assert_eq!(summary.passed(), 2);
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        let prompts = prompts.lock().unwrap();
        assert!(prompts[0].contains("- rearrangement/rearrange: Rearrange objects"));
        assert!(prompts[1].contains("=== Example: rearrangement/rearrange (Rearrange) ==="));
    }

    #[test]
    fn save_path_falls_back_and_sanitizes() {
        let (ctx, _) = context(TaskScript::completes_in(1), Vec::new());
        let dir = Path::new("/work/gen");

        let path = save_task_code(&ctx, "class A(BaseTask): pass", dir).unwrap();
        assert_eq!(path, dir.join("generated_task.py"));

        let path = save_task_code(&ctx, "task_name = \"../evil name\"", dir).unwrap();
        assert_eq!(path.parent(), Some(dir));
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with(".py"));
        assert!(!path.to_str().unwrap().contains(".."));
    }

    #[test]
    fn missing_api_reference_degrades_to_empty() {
        let (ctx, _) = context(TaskScript::completes_in(1), Vec::new());
        assert_eq!(load_api_reference(&ctx, Some(Path::new("/nope.txt"))), "");
        assert_eq!(load_api_reference(&ctx, None), "");
    }
}
