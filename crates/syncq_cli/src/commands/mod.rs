//! CLI command implementations.

pub mod enqueue;
pub mod inspect;
pub mod maintain;

use std::path::Path;
use syncq_engine::{EngineConfig, SyncEngine};
use syncq_storage::FileStore;

/// Opens the queue at `path`, creating parent directories if needed.
pub fn open_engine(path: &Path) -> Result<SyncEngine<FileStore>, Box<dyn std::error::Error>> {
    tracing::debug!(path = %path.display(), "opening queue");
    let store = FileStore::open_with_create_dirs(path)?;
    Ok(SyncEngine::open(store, EngineConfig::default())?)
}
