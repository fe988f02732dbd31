//! Inspect command implementation.

use serde::Serialize;
use std::path::Path;
use syncq_engine::{StatusCounts, SyncItem, SyncStatus};

use super::open_engine;

/// Queue inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Queue file path.
    pub path: String,
    /// Queue file size in bytes.
    pub file_size: u64,
    /// Items per status.
    pub counts: StatusCounts,
    /// Number of failed items that need an explicit retry.
    pub needs_retry: usize,
    /// Items in enqueue order (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<SyncItem>>,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_items: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No queue found at {:?}", path).into());
    }

    let engine = open_engine(path)?;
    let counts = engine.queue().counts();
    let result = InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path)?.len(),
        counts,
        needs_retry: counts.failed,
        items: show_items.then(|| engine.queue().list_all()),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Queue: {}", result.path);
    println!("File size: {} bytes", result.file_size);
    println!();
    println!("Items: {}", result.counts.total());
    println!("  pending:  {}", result.counts.pending);
    println!("  syncing:  {}", result.counts.syncing);
    println!("  synced:   {}", result.counts.synced);
    println!("  failed:   {}", result.counts.failed);
    println!("  conflict: {}", result.counts.conflict);

    if result.needs_retry > 0 {
        println!();
        println!(
            "{} failed item(s); run `syncq retry-failed` to re-queue them",
            result.needs_retry
        );
    }

    if let Some(items) = &result.items {
        println!();
        for item in items {
            println!("{}", format_item(item));
        }
    }
}

fn format_item(item: &SyncItem) -> String {
    let mut line = format!(
        "{}  {:<8} {:<6} {}/{}  attempts={}",
        item.id,
        item.status.as_str(),
        item.operation.as_str(),
        item.resource_type,
        item.resource_id,
        item.attempts
    );
    if let Some(at) = item.next_attempt_at {
        line.push_str(&format!("  next_attempt_at={at}"));
    }
    if item.status != SyncStatus::Synced {
        if let Some(error) = &item.last_error {
            line.push_str(&format!("  error={error:?}"));
        }
    }
    line
}
