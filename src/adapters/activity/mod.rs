pub mod kv_activity_log;
