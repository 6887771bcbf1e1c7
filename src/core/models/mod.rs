pub mod activity_entry;
pub mod catalog;
pub mod checklist;
pub mod photo;
