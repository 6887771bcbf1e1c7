use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::core::errors::{Result, SitecheckError};
use crate::core::models::activity_entry::{ActivityAction, ActivityEntry, EntityType, SYSTEM_ACTOR};
use crate::core::models::photo::{PhotoRecord, PhotoTarget};
use crate::core::services::entity_store::EntityStore;
use crate::core::traits::activity_log::ActivityLog;
use crate::core::traits::blob_store::BlobStore;
use crate::core::traits::kv_store::{WriteBatch, is_valid_key};

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// An incoming photo and what it is attached to.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub target: PhotoTarget,
    pub entity_id: String,
    pub item_index: Option<usize>,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

fn index_key(target: PhotoTarget, entity_id: &str) -> String {
    format!("{target}_photos_{entity_id}")
}

/// Compute the SHA256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Pick a file extension from the file name, falling back to the content type.
fn extension_for(file_name: &str, content_type: &str) -> String {
    let from_name = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }

    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "bin",
    }
    .to_string()
}

/// Binds uploaded photos to inspections, issues and checklists.
///
/// Bytes go to the blob store; metadata and the per-entity index live in
/// the key-value store.
pub struct PhotoService {
    store: EntityStore,
    blobs: Arc<dyn BlobStore>,
    activities: Arc<dyn ActivityLog>,
    max_upload_bytes: u64,
}

impl PhotoService {
    pub fn new(
        store: EntityStore,
        blobs: Arc<dyn BlobStore>,
        activities: Arc<dyn ActivityLog>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            store,
            blobs,
            activities,
            max_upload_bytes,
        }
    }

    pub fn upload(&self, upload: PhotoUpload) -> Result<PhotoRecord> {
        if !is_valid_key(&upload.entity_id) {
            return Err(SitecheckError::validation(format!(
                "invalid entity id '{}'",
                upload.entity_id
            )));
        }
        if upload.bytes.is_empty() {
            return Err(SitecheckError::validation("No file provided"));
        }
        let size = upload.bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(SitecheckError::validation(format!(
                "photo is {size} bytes, the limit is {}",
                self.max_upload_bytes
            )));
        }

        let now = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let path = format!(
            "{}/{}/{}-{}.{}",
            upload.target,
            upload.entity_id,
            now.timestamp_millis(),
            &suffix[..8],
            extension_for(&upload.file_name, &upload.content_type)
        );
        let id = format!("photo_{}", uuid::Uuid::new_v4().simple());

        let record = PhotoRecord {
            url: format!("/photos/{id}"),
            id,
            file_name: upload.file_name,
            path,
            entity_type: upload.target,
            entity_id: upload.entity_id,
            item_index: upload.item_index,
            uploaded_at: now,
            size,
            content_type: upload.content_type,
            sha256: sha256_hex(&upload.bytes),
        };

        self.blobs.put(&record.path, &upload.bytes)?;

        let index = index_key(record.entity_type, &record.entity_id);
        let mut batch = WriteBatch::new();
        let mut ids: Vec<String> = self.store.staged_list(&batch, &index)?;
        ids.push(record.id.clone());
        EntityStore::stage_list(&mut batch, &index, &ids)?;
        EntityStore::stage_item(&mut batch, &record.id, &record)?;
        self.log(
            &mut batch,
            ActivityAction::Upload,
            &record,
            format!("Uploaded photo for {} {}", record.entity_type, record.entity_id),
        )?;

        if let Err(e) = self.store.commit(batch) {
            if let Err(cleanup) = self.blobs.delete(&record.path) {
                warn!(path = %record.path, error = %cleanup, "Failed to remove orphaned photo blob");
            }
            return Err(e);
        }

        info!(
            photo = %record.id,
            entity_type = %record.entity_type,
            entity_id = %record.entity_id,
            size,
            "Photo uploaded"
        );
        Ok(record)
    }

    /// Photos attached to one entity, in upload order.
    pub fn list(&self, target: PhotoTarget, entity_id: &str) -> Result<Vec<PhotoRecord>> {
        let index = index_key(target, entity_id);
        if !is_valid_key(&index) {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = self.store.get_list(&index)?;
        Ok(self
            .store
            .multi_get::<PhotoRecord>(&ids)?
            .into_iter()
            .flatten()
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<PhotoRecord> {
        let record = if is_valid_key(id) && id.starts_with("photo_") {
            self.store.get_item::<PhotoRecord>(id)?
        } else {
            None
        };
        record.ok_or_else(|| SitecheckError::PhotoNotFound { id: id.to_string() })
    }

    /// Metadata and bytes of one photo.
    pub fn content(&self, id: &str) -> Result<(PhotoRecord, Vec<u8>)> {
        let record = self.get(id)?;
        let bytes = self.blobs.get(&record.path)?;
        Ok((record, bytes))
    }

    /// Remove the metadata first, then the bytes. A blob that cannot be
    /// removed is left behind and logged.
    pub fn delete(&self, id: &str) -> Result<()> {
        let record = self.get(id)?;

        let index = index_key(record.entity_type, &record.entity_id);
        let mut batch = WriteBatch::new();
        let mut ids: Vec<String> = self.store.staged_list(&batch, &index)?;
        ids.retain(|other| other != &record.id);
        EntityStore::stage_list(&mut batch, &index, &ids)?;
        batch.delete(&record.id);
        self.log(
            &mut batch,
            ActivityAction::Delete,
            &record,
            format!("Deleted photo from {} {}", record.entity_type, record.entity_id),
        )?;
        self.store.commit(batch)?;

        if let Err(e) = self.blobs.delete(&record.path) {
            warn!(photo = %record.id, path = %record.path, error = %e, "Failed to remove photo blob");
        }

        info!(photo = %record.id, "Photo deleted");
        Ok(())
    }

    fn log(
        &self,
        batch: &mut WriteBatch,
        action: ActivityAction,
        record: &PhotoRecord,
        details: String,
    ) -> Result<()> {
        let entry = ActivityEntry::new(
            SYSTEM_ACTOR,
            action,
            EntityType::Photo,
            record.id.clone(),
            details,
            Utc::now(),
        );
        self.activities.record(batch, &entry)
    }
}
