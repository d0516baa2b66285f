//! `taskgen corpus` command.

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::corpus::{build_corpus, TaskDocument};

/// Execute the `corpus` command.
///
/// Lists every document the retrieval index would be built from, builtin
/// tasks first.
///
/// # Errors
///
/// Returns an error string if the task registry cannot be read.
pub fn run(ctx: &ServiceContext, settings: &Settings) -> Result<(), String> {
    let docs = build_corpus(ctx, &settings.generated_dir())?;
    if docs.is_empty() {
        println!("Corpus is empty.");
        return Ok(());
    }
    print!("{}", table(&docs));
    Ok(())
}

fn table(docs: &[TaskDocument]) -> String {
    let rows: Vec<[String; 4]> = docs
        .iter()
        .map(|doc| {
            [
                doc.origin.to_string(),
                doc.group.clone(),
                doc.task_name.clone(),
                doc.class_name.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    let header = ["ORIGIN", "GROUP", "TASK", "CLASS"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 4]| {
        format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {}\n",
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        )
    };
    let mut out = line(header);
    for row in &rows {
        out.push_str(&line([&row[0], &row[1], &row[2], &row[3]]));
    }
    out.push_str(&format!("\n{} documents\n", docs.len()));
    out
}
