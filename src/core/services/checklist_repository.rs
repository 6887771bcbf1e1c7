use crate::core::errors::Result;
use crate::core::models::checklist::Checklist;
use crate::core::services::entity_store::EntityStore;
use crate::core::traits::kv_store::{WriteBatch, is_valid_key};

/// Store key of the ordered id index.
pub const INDEX_KEY: &str = "checklists_index";

fn record_key(id: &str) -> String {
    format!("checklist_{id}")
}

/// Checklists stored one document per id, with an insertion-ordered index.
#[derive(Clone)]
pub struct ChecklistRepository {
    store: EntityStore,
}

impl ChecklistRepository {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Every checklist in creation order. Index entries whose record is
    /// missing are skipped.
    pub fn list(&self) -> Result<Vec<Checklist>> {
        let ids: Vec<String> = self.store.get_list(INDEX_KEY)?;
        let keys: Vec<String> = ids.iter().map(|id| record_key(id)).collect();
        Ok(self
            .store
            .multi_get::<Checklist>(&keys)?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Look up one checklist. Ids that cannot be store keys are simply absent.
    pub fn get(&self, id: &str) -> Result<Option<Checklist>> {
        let key = record_key(id);
        if !is_valid_key(&key) {
            return Ok(None);
        }
        self.store.get_item(&key)
    }

    /// Stage a new checklist and its index entry.
    pub fn stage_insert(&self, batch: &mut WriteBatch, checklist: &Checklist) -> Result<()> {
        let mut ids: Vec<String> = self.store.staged_list(batch, INDEX_KEY)?;
        if !ids.contains(&checklist.id) {
            ids.push(checklist.id.clone());
        }
        EntityStore::stage_list(batch, INDEX_KEY, &ids)?;
        EntityStore::stage_item(batch, &record_key(&checklist.id), checklist)
    }

    /// Stage an overwrite of an existing checklist.
    pub fn stage_update(&self, batch: &mut WriteBatch, checklist: &Checklist) -> Result<()> {
        EntityStore::stage_item(batch, &record_key(&checklist.id), checklist)
    }
}
