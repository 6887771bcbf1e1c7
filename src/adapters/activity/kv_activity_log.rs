use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::errors::{Result, SitecheckError};
use crate::core::models::activity_entry::ActivityEntry;
use crate::core::traits::activity_log::ActivityLog;
use crate::core::traits::kv_store::{KvStore, WriteBatch};

/// Store key holding the newest-first list of entries.
pub const ACTIVITIES_KEY: &str = "activities_list";

/// Default number of entries kept.
pub const DEFAULT_RETAIN: usize = 1000;

/// Activity log kept as one newest-first list in the key-value store,
/// truncated to the `retain` most recent entries.
pub struct KvActivityLog {
    store: Arc<dyn KvStore>,
    retain: usize,
}

impl KvActivityLog {
    pub fn new(store: Arc<dyn KvStore>, retain: usize) -> Self {
        Self {
            store,
            retain: retain.max(1),
        }
    }

    /// Create a log from the `[activity]` config section, falling back to
    /// defaults if it is missing.
    pub fn from_config(
        store: Arc<dyn KvStore>,
        section: Option<&crate::config::app_config::ActivitySection>,
    ) -> Self {
        let retain = section.map(|s| s.retain).unwrap_or(DEFAULT_RETAIN);
        Self::new(store, retain)
    }

    fn decode(value: serde_json::Value) -> Result<Vec<ActivityEntry>> {
        serde_json::from_value(value).map_err(|e| {
            SitecheckError::storage(format!("Malformed activity log at '{ACTIVITIES_KEY}': {e}"))
        })
    }

    fn load(&self) -> Result<Vec<ActivityEntry>> {
        match self.store.get(ACTIVITIES_KEY)? {
            Some(value) => Self::decode(value),
            None => Ok(Vec::new()),
        }
    }

    /// Entries as they will be after `batch` commits.
    fn load_through(&self, batch: &WriteBatch) -> Result<Vec<ActivityEntry>> {
        match batch.pending(ACTIVITIES_KEY) {
            Some(Some(value)) => Self::decode(value.clone()),
            Some(None) => Ok(Vec::new()),
            None => self.load(),
        }
    }
}

impl ActivityLog for KvActivityLog {
    fn record(&self, batch: &mut WriteBatch, entry: &ActivityEntry) -> Result<()> {
        let mut entries = self.load_through(batch)?;
        entries.insert(0, entry.clone());
        entries.truncate(self.retain);
        batch.set(ACTIVITIES_KEY, serde_json::to_value(&entries)?);
        Ok(())
    }

    fn append(&self, entry: &ActivityEntry) -> Result<()> {
        let mut batch = WriteBatch::new();
        self.record(&mut batch, entry)?;
        self.store.commit(batch)
    }

    fn list(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let mut entries = self.load()?;
        entries.truncate(limit);
        Ok(entries)
    }

    fn query(&self, user: Option<&str>, since: Option<DateTime<Utc>>) -> Result<Vec<ActivityEntry>> {
        let user_lower = user.map(str::to_lowercase);

        Ok(self
            .load()?
            .into_iter()
            .filter(|entry| {
                user_lower
                    .as_ref()
                    .is_none_or(|u| entry.user_id.to_lowercase().contains(u))
            })
            .filter(|entry| since.is_none_or(|s| entry.timestamp >= s))
            .collect())
    }
}
