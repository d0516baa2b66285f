//! `taskgen failures` command.

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::memory::FailureStore;

/// Execute the `failures` command.
///
/// Prints the failure block the next code prompt would carry, or empties
/// the store when `clear` is set.
///
/// # Errors
///
/// Returns an error string if clearing fails.
pub fn run(ctx: &ServiceContext, settings: &Settings, clear: bool) -> Result<(), String> {
    let store = FailureStore::new(ctx, &settings.failure_store());
    if clear {
        store.clear()?;
        println!("Cleared {}", store.path().display());
        return Ok(());
    }
    let records = store.load();
    if records.is_empty() {
        println!("No recorded failures in {}", store.path().display());
        return Ok(());
    }
    println!("{} recorded failures in {}\n", records.len(), store.path().display());
    println!("{}", store.render_for_prompt());
    Ok(())
}
