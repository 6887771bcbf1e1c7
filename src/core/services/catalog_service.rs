use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::info;

use crate::core::errors::{Result, SitecheckError};
use crate::core::models::activity_entry::{ActivityAction, ActivityEntry, SYSTEM_ACTOR};
use crate::core::models::catalog::CatalogRecord;
use crate::core::services::entity_store::EntityStore;
use crate::core::traits::activity_log::ActivityLog;
use crate::core::traits::kv_store::WriteBatch;

/// Fields a client may never set through create or update.
const IMMUTABLE_FIELDS: [&str; 2] = ["id", "createdAt"];

/// CRUD over the projects, users and formats lists.
///
/// Records arrive as loose JSON objects and are validated by
/// deserialising into the concrete record type.
pub struct CatalogService {
    store: EntityStore,
    activities: Arc<dyn ActivityLog>,
}

impl CatalogService {
    pub fn new(store: EntityStore, activities: Arc<dyn ActivityLog>) -> Self {
        Self { store, activities }
    }

    pub fn list<T: CatalogRecord>(&self) -> Result<Vec<T>> {
        self.store.get_list(T::LIST_KEY)
    }

    pub fn create<T: CatalogRecord>(&self, body: Value) -> Result<T> {
        let fields = into_object(body)?;
        reject_immutable(&fields)?;

        let has_name = fields
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| !n.trim().is_empty());
        if !has_name {
            return Err(SitecheckError::validation("Name is required"));
        }

        let now = Utc::now();
        let mut merged = T::defaults();
        merged.extend(fields);
        merged.insert(
            "id".into(),
            Value::String(format!("{}_{}", T::ID_PREFIX, uuid::Uuid::new_v4().simple())),
        );
        merged.insert("createdAt".into(), serde_json::to_value(now)?);
        let record: T = decode(merged)?;

        let mut batch = WriteBatch::new();
        let mut records: Vec<T> = self.store.staged_list(&batch, T::LIST_KEY)?;
        records.push(record.clone());
        EntityStore::stage_list(&mut batch, T::LIST_KEY, &records)?;
        self.log::<T>(
            &mut batch,
            ActivityAction::Create,
            record.id(),
            format!("Created {}: {}", T::ENTITY_TYPE, record.name()),
        )?;
        self.store.commit(batch)?;

        info!(kind = %T::ENTITY_TYPE, id = %record.id(), "Catalog record created");
        Ok(record)
    }

    /// Merge `body` over the stored record and stamp `updatedAt`.
    pub fn update<T: CatalogRecord>(&self, id: &str, body: Value) -> Result<T> {
        let fields = into_object(body)?;
        reject_immutable(&fields)?;

        let mut records: Vec<T> = self.store.get_list(T::LIST_KEY)?;
        let slot = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| not_found::<T>(id))?;

        let mut merged = into_object(serde_json::to_value(&*slot)?)?;
        merged.extend(fields);
        merged.insert("updatedAt".into(), serde_json::to_value(Utc::now())?);
        let record: T = decode(merged)?;
        *slot = record.clone();

        let mut batch = WriteBatch::new();
        EntityStore::stage_list(&mut batch, T::LIST_KEY, &records)?;
        self.log::<T>(
            &mut batch,
            ActivityAction::Update,
            id,
            format!("Updated {}: {}", T::ENTITY_TYPE, record.name()),
        )?;
        self.store.commit(batch)?;

        info!(kind = %T::ENTITY_TYPE, id, "Catalog record updated");
        Ok(record)
    }

    pub fn delete<T: CatalogRecord>(&self, id: &str) -> Result<()> {
        let mut records: Vec<T> = self.store.get_list(T::LIST_KEY)?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Err(not_found::<T>(id));
        }

        let mut batch = WriteBatch::new();
        EntityStore::stage_list(&mut batch, T::LIST_KEY, &records)?;
        self.log::<T>(
            &mut batch,
            ActivityAction::Delete,
            id,
            format!("Deleted {}", T::ENTITY_TYPE),
        )?;
        self.store.commit(batch)?;

        info!(kind = %T::ENTITY_TYPE, id, "Catalog record deleted");
        Ok(())
    }

    fn log<T: CatalogRecord>(
        &self,
        batch: &mut WriteBatch,
        action: ActivityAction,
        id: &str,
        details: String,
    ) -> Result<()> {
        let entry = ActivityEntry::new(SYSTEM_ACTOR, action, T::ENTITY_TYPE, id, details, Utc::now());
        self.activities.record(batch, &entry)
    }
}

fn not_found<T: CatalogRecord>(id: &str) -> SitecheckError {
    SitecheckError::EntityNotFound {
        kind: T::ENTITY_TYPE.label().to_string(),
        id: id.to_string(),
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(fields) => Ok(fields),
        _ => Err(SitecheckError::validation("Request body must be a JSON object")),
    }
}

fn reject_immutable(fields: &Map<String, Value>) -> Result<()> {
    match IMMUTABLE_FIELDS.iter().find(|f| fields.contains_key(**f)) {
        Some(field) => Err(SitecheckError::validation(format!(
            "Field '{field}' cannot be changed"
        ))),
        None => Ok(()),
    }
}

fn decode<T: CatalogRecord>(fields: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| {
        SitecheckError::validation(format!("Invalid {}: {e}", T::ENTITY_TYPE))
    })
}
