//! Queue maintenance commands: retry-failed, compact, remove, clear.

use std::path::Path;
use syncq_engine::ItemId;

use super::open_engine;

/// Moves failed items back to pending.
pub fn retry_failed(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(path)?;
    let reset = engine.retry_failed()?;
    tracing::info!(path = %path.display(), reset, "retry-failed finished");
    println!("Re-queued {} failed item(s)", reset);
    Ok(())
}

/// Removes synced items.
pub fn compact(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(path)?;
    let before = engine.queue().len();

    if dry_run {
        let synced = engine.queue().counts().synced;
        println!("Dry run: would remove {} synced item(s)", synced);
        println!("  Items before: {}", before);
        println!("  Items after:  {}", before - synced);
        return Ok(());
    }

    let removed = engine.compact_synced()?;
    tracing::info!(path = %path.display(), removed, "compaction finished");
    println!("Compaction complete");
    println!("  Removed: {}", removed);
    println!("  Remaining: {}", engine.queue().len());
    Ok(())
}

/// Removes one item.
pub fn remove(path: &Path, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id: ItemId = id.parse()?;
    let engine = open_engine(path)?;
    if engine.remove(id)? {
        tracing::info!(path = %path.display(), %id, "item removed");
        println!("Removed {}", id);
        Ok(())
    } else {
        Err(format!("No item {} in queue", id).into())
    }
}

/// Removes every item.
pub fn clear(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(path)?;
    let removed = engine.clear()?;
    tracing::info!(path = %path.display(), removed, "queue cleared");
    println!("Removed {} item(s)", removed);
    Ok(())
}
