pub mod file_kv_store;
#[cfg(test)]
pub mod memory_kv_store;
