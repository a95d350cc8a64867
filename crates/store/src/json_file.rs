//! Contribution store backed by a single JSON document on disk.
//!
//! Every operation holds an advisory lock on a sidecar `<name>.lock` file, so
//! processes sharing the document never interleave a read-modify-write cycle.
//! Writes go to a uniquely named temporary file in the same directory and are
//! renamed over the document, so readers never observe a partial document.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use pipeline::{
    ActorId, Contribution, ContributionId, ContributionStatus, ContributionStore,
    NewContribution, StoreError, Timestamp,
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

/// On-disk layout. Versioned so the format can evolve.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    version: u32,
    contributions: Vec<Contribution>,
}

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Persists contributions to a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileContributionStore {
    path: PathBuf,
}

impl JsonFileContributionStore {
    /// Opens (lazily) the store at `path`. The file is created on first insert.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `op` on the blocking pool while the sidecar lock is held.
    async fn with_lock<T, F>(&self, mode: LockMode, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock = acquire_lock(&path, mode)?;
            let result = op(&path);
            drop(lock);
            result
        })
        .await
        .map_err(|e| StoreError::Io(format!("contribution store task failed: {e}")))?
    }

    async fn read<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Document) -> T + Send + 'static,
    {
        self.with_lock(LockMode::Shared, move |path| Ok(op(load(path)?)))
            .await
    }

    async fn modify<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Document) -> Result<T, StoreError> + Send + 'static,
    {
        self.with_lock(LockMode::Exclusive, move |path| {
            let mut document = load(path)?;
            let result = op(&mut document)?;
            save(path, &document)?;
            Ok(result)
        })
        .await
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

fn acquire_lock(path: &Path, mode: LockMode) -> Result<File, StoreError> {
    let parent = parent_dir(path);
    std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;

    let lock_path = lock_path(path);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| io_error(&lock_path, e))?;
    match mode {
        LockMode::Shared => FileExt::lock_shared(&file),
        LockMode::Exclusive => FileExt::lock_exclusive(&file),
    }
    .map_err(|e| io_error(&lock_path, e))?;
    Ok(file)
}

fn load(path: &Path) -> Result<Document, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(Document {
                version: DOCUMENT_VERSION,
                contributions: Vec::new(),
            })
        }
        Err(e) => return Err(io_error(path, e)),
    };

    let document: Document = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
    if document.version != DOCUMENT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "{}: unsupported document version {}",
            path.display(),
            document.version
        )));
    }
    Ok(document)
}

fn save(path: &Path, document: &Document) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| StoreError::Corrupt(format!("encoding contributions: {e}")))?;

    let parent = parent_dir(path);
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;
    tmp.write_all(&bytes).map_err(|e| io_error(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_error(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;

    debug!(path = %path.display(), records = document.contributions.len(), "Contribution store saved");
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io(format!("{}: {e}", path.display()))
}

#[async_trait]
impl ContributionStore for JsonFileContributionStore {
    async fn insert(&self, contribution: NewContribution) -> Result<Contribution, StoreError> {
        self.modify(move |document| {
            let record = Contribution::from_new(
                ContributionId::new_random(),
                contribution,
                Timestamp::now(),
            );
            document.contributions.push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn get(&self, id: ContributionId) -> Result<Option<Contribution>, StoreError> {
        self.read(move |document| document.contributions.into_iter().find(|c| c.id == id))
            .await
    }

    async fn list(&self, actor: Option<&ActorId>) -> Result<Vec<Contribution>, StoreError> {
        let actor = actor.cloned();
        self.read(move |document| {
            document
                .contributions
                .into_iter()
                .filter(|c| actor.as_ref().map_or(true, |a| &c.actor == a))
                .collect()
        })
        .await
    }

    async fn update_status(
        &self,
        id: ContributionId,
        status: ContributionStatus,
    ) -> Result<Contribution, StoreError> {
        self.modify(move |document| {
            let record = document
                .contributions
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(StoreError::NotFound(id))?;
            record.status = status;
            record.updated_at = Timestamp::now();
            Ok(record.clone())
        })
        .await
    }
}
