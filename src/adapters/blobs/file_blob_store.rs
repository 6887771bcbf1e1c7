use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::core::errors::{Result, SitecheckError};
use crate::core::traits::blob_store::BlobStore;
use crate::core::traits::kv_store::is_valid_key;

/// Blob store that writes photo bytes under a root directory.
#[derive(Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a relative blob path, refusing anything that could escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for segment in path.split('/') {
            if !is_valid_key(segment) {
                return Err(SitecheckError::InvalidKey {
                    key: path.to_string(),
                });
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

impl BlobStore for FileBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        let parent = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.persist(&target).map_err(|e| SitecheckError::Io(e.error))?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        if !target.exists() {
            return Err(SitecheckError::BlobMissing {
                path: path.to_string(),
            });
        }
        Ok(fs::read(target)?)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if target.exists() {
            fs::remove_file(target)?;
        }
        Ok(())
    }
}
