pub mod activity_log;
pub mod blob_store;
pub mod kv_store;
