use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::errors::{Result, SitecheckError};
use crate::core::traits::kv_store::{KvStore, WriteBatch};

/// Typed access to named lists and keyed documents through a `KvStore`.
///
/// Absent lists read as empty. Staging methods write into a `WriteBatch`
/// so several changes can be committed as one unit of work; `staged_*`
/// reads see writes already pending in the batch.
#[derive(Clone)]
pub struct EntityStore {
    kv: Arc<dyn KvStore>,
}

impl EntityStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| SitecheckError::storage(format!("Malformed record at key '{key}': {e}")))
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.kv.get(key)?.is_some())
    }

    pub fn get_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        match self.kv.get(name)? {
            Some(value) => Self::decode(name, value),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_list<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        self.kv.set(name, serde_json::to_value(items)?)
    }

    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.kv
            .get(key)?
            .map(|value| Self::decode(key, value))
            .transpose()
    }

    pub fn set_item<T: Serialize>(&self, key: &str, item: &T) -> Result<()> {
        self.kv.set(key, serde_json::to_value(item)?)
    }

    pub fn delete_item(&self, key: &str) -> Result<()> {
        self.kv.delete(key)
    }

    /// Read several keyed documents; absent keys yield `None` in place.
    pub fn multi_get<T: DeserializeOwned>(&self, keys: &[String]) -> Result<Vec<Option<T>>> {
        self.kv
            .multi_get(keys)?
            .into_iter()
            .zip(keys)
            .map(|(value, key)| value.map(|v| Self::decode(key, v)).transpose())
            .collect()
    }

    /// Read a list as it will be once `batch` commits.
    pub fn staged_list<T: DeserializeOwned>(&self, batch: &WriteBatch, name: &str) -> Result<Vec<T>> {
        match batch.pending(name) {
            Some(Some(value)) => Self::decode(name, value.clone()),
            Some(None) => Ok(Vec::new()),
            None => self.get_list(name),
        }
    }

    pub fn stage_list<T: Serialize>(batch: &mut WriteBatch, name: &str, items: &[T]) -> Result<()> {
        batch.set(name, serde_json::to_value(items)?);
        Ok(())
    }

    pub fn stage_item<T: Serialize>(batch: &mut WriteBatch, key: &str, item: &T) -> Result<()> {
        batch.set(key, serde_json::to_value(item)?);
        Ok(())
    }

    pub fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.kv.commit(batch)
    }
}
