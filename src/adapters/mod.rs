pub mod activity;
pub mod blobs;
pub mod http;
pub mod kv;
