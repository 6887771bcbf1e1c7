use chrono::{DateTime, Utc};

use crate::core::errors::Result;
use crate::core::models::activity_entry::ActivityEntry;
use crate::core::traits::kv_store::WriteBatch;

/// Port for recording and querying activity entries.
pub trait ActivityLog: Send + Sync {
    /// Stage `entry` into `batch` so it commits together with the
    /// state change it describes.
    fn record(&self, batch: &mut WriteBatch, entry: &ActivityEntry) -> Result<()>;

    /// Append an entry on its own.
    fn append(&self, entry: &ActivityEntry) -> Result<()>;

    /// The newest `limit` entries, newest first.
    fn list(&self, limit: usize) -> Result<Vec<ActivityEntry>>;

    /// Every retained entry, newest first, optionally filtered.
    fn query(&self, user: Option<&str>, since: Option<DateTime<Utc>>)
    -> Result<Vec<ActivityEntry>>;
}
