pub mod file_blob_store;
#[cfg(test)]
pub mod memory_blob_store;
