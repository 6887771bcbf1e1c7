use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{Result, SitecheckError};

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid key regex"));

/// Whether `key` is acceptable as a store key.
///
/// Keys double as file names in the file-backed store, so separators
/// and leading dots are never allowed.
pub fn is_valid_key(key: &str) -> bool {
    key.len() <= 200 && KEY_PATTERN.is_match(key)
}

/// Reject keys that `is_valid_key` refuses.
pub fn validate_key(key: &str) -> Result<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(SitecheckError::InvalidKey {
            key: key.to_string(),
        })
    }
}

/// A single write inside a `WriteBatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    Set { key: String, value: Value },
    Delete { key: String },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered group of writes committed as one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.ops.push(WriteOp::Set {
            key: key.into(),
            value,
        });
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(WriteOp::Delete { key: key.into() });
    }

    /// The pending state of `key` in this batch.
    ///
    /// `None` means the batch does not touch the key; `Some(None)` means
    /// the last write deletes it.
    pub fn pending(&self, key: &str) -> Option<Option<&Value>> {
        self.ops.iter().rev().find(|op| op.key() == key).map(|op| match op {
            WriteOp::Set { value, .. } => Some(value),
            WriteOp::Delete { .. } => None,
        })
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Check every key before anything is written.
    pub fn validate(&self) -> Result<()> {
        self.ops.iter().try_for_each(|op| validate_key(op.key()))
    }
}

/// Port for the key-value document store.
///
/// Implementations live in `adapters::kv` (e.g. FileKvStore, MemoryKvStore).
/// `commit` must apply a batch entirely or not at all.
pub trait KvStore: Send + Sync {
    /// Read one document, `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Apply every write in `batch` atomically.
    fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Read several documents, preserving order.
    fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    /// Write one document.
    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(key, value);
        self.commit(batch)
    }

    /// Remove one document. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.commit(batch)
    }
}
