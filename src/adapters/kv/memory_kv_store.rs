use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::core::errors::Result;
use crate::core::traits::kv_store::{KvStore, WriteBatch, WriteOp};

/// In-process store; a batch is applied under a single write lock.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        batch.validate()?;

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for op in batch.ops() {
            match op {
                WriteOp::Set { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                WriteOp::Delete { key } => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_get_delete() {
        let store = MemoryKvStore::new();
        store.set("k", json!({ "a": 1 })).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!({ "a": 1 })));

        store.delete("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn rejected_batch_leaves_store_untouched() {
        let store = MemoryKvStore::new();
        let mut batch = WriteBatch::new();
        batch.set("ok", json!(1));
        batch.set("not/ok", json!(2));

        assert!(store.commit(batch).is_err());
        assert_eq!(store.len(), 0);
    }
}
