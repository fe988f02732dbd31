//! File-based snapshot store for persistent queues.

use crate::backend::SnapshotStore;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// A file-based snapshot store.
///
/// The snapshot lives in a single file. A sibling `<file>.lock` file holds an
/// advisory exclusive lock for as long as the store is open, so only one
/// process writes the queue at a time.
///
/// # Durability
///
/// `save` uses write-then-rename:
/// 1. Write the snapshot to `<file>.tmp`
/// 2. `sync_all` the temporary file
/// 3. Rename it over the snapshot file
/// 4. Fsync the parent directory (Unix) so the rename is durable
///
/// A crash at any step leaves either the old or the new snapshot in place.
///
/// # Example
///
/// ```no_run
/// use syncq_storage::{FileStore, SnapshotStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("queue.syncq")).unwrap();
/// store.save(b"snapshot").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    temp_path: PathBuf,
    write_guard: Mutex<()>,
    _lock_file: File,
}

impl FileStore {
    /// Opens a file store at the given path.
    ///
    /// The snapshot file itself is created lazily on the first save.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The lock file cannot be created
    /// - Another process holds the lock (returns `Locked`)
    pub fn open(path: &Path) -> StorageResult<Self> {
        let lock_path = sibling(path, "lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path.display().to_string()));
        }

        tracing::debug!(path = %path.display(), "opened file snapshot store");

        Ok(Self {
            path: path.to_path_buf(),
            temp_path: sibling(path, "tmp"),
            write_guard: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Opens a file store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the store cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::open(path)
    }

    /// Returns the path to the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn sync_parent(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            let dir = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    fn save(&self, data: &[u8]) -> StorageResult<()> {
        let _guard = self.write_guard.lock();

        let mut file = File::create(&self.temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_parent()?;

        tracing::debug!(path = %self.path.display(), bytes = data.len(), "snapshot saved");
        Ok(())
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
