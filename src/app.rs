use std::path::Path;
use std::sync::Arc;

use crate::adapters::activity::kv_activity_log::KvActivityLog;
use crate::adapters::blobs::file_blob_store::FileBlobStore;
use crate::adapters::kv::file_kv_store::FileKvStore;
use crate::config::app_config::AppConfig;
use crate::core::errors::Result;
use crate::core::services::catalog_service::CatalogService;
use crate::core::services::entity_store::EntityStore;
use crate::core::services::photo_service::PhotoService;
use crate::core::services::workflow_service::{WorkflowPolicy, WorkflowService};
use crate::core::traits::activity_log::ActivityLog;
use crate::core::traits::blob_store::BlobStore;
use crate::core::traits::kv_store::KvStore;

/// Directory inside the data directory that holds the record store.
pub const STORE_DIR: &str = "store";

/// Every service, wired to one store.
pub struct App {
    pub store: EntityStore,
    pub activities: Arc<dyn ActivityLog>,
    pub workflow: WorkflowService,
    pub catalog: CatalogService,
    pub photos: PhotoService,
}

impl App {
    /// Open the file-backed store under `data_dir`.
    pub fn open(data_dir: &Path, config: &AppConfig) -> Result<Self> {
        let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::open(&data_dir.join(STORE_DIR))?);
        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(config.photos_dir(data_dir)));
        let activities: Arc<dyn ActivityLog> =
            Arc::new(KvActivityLog::from_config(kv.clone(), Some(&config.activity)));

        Ok(Self::assemble(
            kv,
            blobs,
            activities,
            config.workflow.policy(),
            config.photos.max_upload_bytes,
        ))
    }

    /// Everything in memory.
    #[cfg(test)]
    pub fn in_memory(policy: WorkflowPolicy) -> Self {
        use crate::adapters::activity::kv_activity_log::DEFAULT_RETAIN;
        use crate::adapters::blobs::memory_blob_store::MemoryBlobStore;
        use crate::adapters::kv::memory_kv_store::MemoryKvStore;
        use crate::core::services::photo_service::DEFAULT_MAX_UPLOAD_BYTES;

        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let activities: Arc<dyn ActivityLog> = Arc::new(KvActivityLog::new(kv.clone(), DEFAULT_RETAIN));
        Self::assemble(
            kv,
            Arc::new(MemoryBlobStore::new()),
            activities,
            policy,
            DEFAULT_MAX_UPLOAD_BYTES,
        )
    }

    fn assemble(
        kv: Arc<dyn KvStore>,
        blobs: Arc<dyn BlobStore>,
        activities: Arc<dyn ActivityLog>,
        policy: WorkflowPolicy,
        max_upload_bytes: u64,
    ) -> Self {
        let store = EntityStore::new(kv);
        Self {
            workflow: WorkflowService::new(store.clone(), activities.clone(), policy),
            catalog: CatalogService::new(store.clone(), activities.clone()),
            photos: PhotoService::new(store.clone(), blobs, activities.clone(), max_upload_bytes),
            store,
            activities,
        }
    }
}
