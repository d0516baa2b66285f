//! `taskgen generate` command.

use crate::cli::GenerateArgs;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::generate::{self, CandidateOutcome, GenerationSettings, RunSummary};

/// Combines configured defaults with command-line overrides.
#[must_use]
pub fn generation_settings(settings: &Settings, args: &GenerateArgs) -> GenerationSettings {
    GenerationSettings {
        brief: args.brief.clone(),
        candidates: args.candidates,
        top_k: args.top_k,
        save: args.save,
        model: args.model.clone().unwrap_or_else(|| settings.llm.model.clone()),
        temperature: Some(args.temperature.unwrap_or(settings.llm.temperature)),
        generated_dir: settings.generated_dir(),
        failure_store: settings.failure_store(),
        api_reference: settings.api_reference.clone(),
        env_config: settings.env.clone(),
    }
}

/// Execute the `generate` command on a single-threaded runtime.
///
/// # Errors
///
/// Returns an error string if the runtime cannot start or the run cannot
/// begin (registry or index failure). Candidates that fail verification do
/// not make the command fail.
pub fn run(ctx: &ServiceContext, settings: &Settings, args: &GenerateArgs) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    let summary = runtime.block_on(generate::run(ctx, &generation_settings(settings, args)))?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "\nSummary: {} passed, {} failed, {} skipped",
        summary.passed(),
        summary.failed(),
        summary.skipped()
    );
    for (i, outcome) in summary.outcomes.iter().enumerate() {
        match outcome {
            CandidateOutcome::Passed {
                task_name,
                saved_to: Some(path),
            } => {
                println!("  #{} {task_name}: passed, saved to {}", i + 1, path.display());
            }
            CandidateOutcome::Passed {
                task_name,
                saved_to: None,
            } => println!("  #{} {task_name}: passed", i + 1),
            CandidateOutcome::Failed {
                task_name,
                stage,
                ..
            } => {
                println!("  #{} {task_name}: failed at {stage}", i + 1);
            }
            CandidateOutcome::Skipped { reason } => {
                let first = reason.lines().next().unwrap_or_default();
                println!("  #{} skipped: {first}", i + 1);
            }
        }
    }
}
