use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::core::errors::{Result, SitecheckError};
use crate::core::traits::kv_store::{KvStore, WriteBatch, WriteOp, validate_key};

const JOURNAL_FILE: &str = "journal.pending";

/// Key-value store that keeps one JSON document per key on disk.
///
/// Layout under the store root:
/// ```text
/// projects_list.json
/// checklist_cl_4f0c....json
/// journal.pending        # only while a batch is being applied
/// ```
///
/// Every file is replaced atomically (temp file + rename). A batch is first
/// persisted as a journal, then applied, then the journal is removed. A
/// journal left behind by a crash or a failed apply is replayed by `open`
/// and again before every commit, so no later batch lands on top of a
/// half-applied one.
pub struct FileKvStore {
    root: PathBuf,
    commit_lock: Mutex<()>,
}

impl FileKvStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let store = Self {
            root: root.to_path_buf(),
            commit_lock: Mutex::new(()),
        };
        store.recover()?;
        Ok(store)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }

    fn journal_path(&self) -> PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    /// Replay a journal left by an interrupted commit.
    fn recover(&self) -> Result<()> {
        let journal = self.journal_path();
        if !journal.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&journal)?;
        let batch: WriteBatch = serde_json::from_str(&content).map_err(|e| {
            SitecheckError::storage(format!(
                "Unreadable journal at {}: {e}",
                journal.display()
            ))
        })?;

        warn!(
            path = %journal.display(),
            writes = batch.len(),
            "Replaying interrupted store commit"
        );
        self.apply(&batch)?;
        fs::remove_file(&journal)?;
        Ok(())
    }

    fn apply(&self, batch: &WriteBatch) -> Result<()> {
        for op in batch.ops() {
            match op {
                WriteOp::Set { key, value } => {
                    let bytes = serde_json::to_vec_pretty(value)?;
                    self.write_atomic(&self.path_for(key)?, &bytes)?;
                }
                WriteOp::Delete { key } => {
                    let path = self.path_for(key)?;
                    if path.exists() {
                        fs::remove_file(&path)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| SitecheckError::Io(e.error))?;
        Ok(())
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let value = serde_json::from_str(&content).map_err(|e| {
            SitecheckError::storage(format!("Malformed document at key '{key}': {e}"))
        })?;
        Ok(Some(value))
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        batch.validate()?;

        let _guard = self
            .commit_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.recover()?;

        let journal = serde_json::to_vec(&batch)?;
        self.write_atomic(&self.journal_path(), &journal)?;
        self.apply(&batch)?;
        fs::remove_file(self.journal_path())?;

        debug!(writes = batch.len(), "Committed batch");
        Ok(())
    }
}
