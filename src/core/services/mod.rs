pub mod catalog_service;
pub mod checklist_repository;
pub mod entity_store;
pub mod photo_service;
pub mod seed_service;
pub mod workflow_service;
