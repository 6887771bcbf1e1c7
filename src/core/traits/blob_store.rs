use crate::core::errors::Result;

/// Port for storing photo bytes.
///
/// Paths are relative, `/`-separated, and made of store-key-safe segments.
pub trait BlobStore: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Fails with `BlobMissing` when nothing is stored at `path`.
    fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Removing an absent blob is not an error.
    fn delete(&self, path: &str) -> Result<()>;
}
