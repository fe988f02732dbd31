//! Enqueue command implementation.

use std::path::Path;
use syncq_engine::{Operation, Payload};

use super::open_engine;

/// Runs the enqueue command.
pub fn run(
    path: &Path,
    operation: &str,
    resource_type: &str,
    resource_id: &str,
    payload: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let operation: Operation = operation.parse()?;
    let payload = payload
        .map(serde_json::from_str::<Payload>)
        .transpose()
        .map_err(|e| format!("Invalid payload: {}", e))?;

    let engine = open_engine(path)?;
    let id = engine.enqueue(operation, resource_type, resource_id, payload)?;
    tracing::debug!(%id, %operation, resource_type, resource_id, "mutation queued");
    println!("{}", id);
    Ok(())
}
