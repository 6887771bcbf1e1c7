use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::errors::{Result, SitecheckError};
use crate::core::traits::blob_store::BlobStore;

/// Blob store kept in memory, used with `MemoryKvStore`.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| SitecheckError::BlobMissing {
                path: path.to_string(),
            })
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.blobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(path);
        Ok(())
    }
}
