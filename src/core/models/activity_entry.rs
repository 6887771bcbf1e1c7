use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor recorded for mutations that no user performs directly.
pub const SYSTEM_ACTOR: &str = "system";

/// Actions that get recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    Submit,
    Check,
    SubmitApproval,
    Approve,
    Upload,
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Submit => "SUBMIT",
            Self::Check => "CHECK",
            Self::SubmitApproval => "SUBMIT_APPROVAL",
            Self::Approve => "APPROVE",
            Self::Upload => "UPLOAD",
        };
        f.write_str(s)
    }
}

/// Kinds of entity an activity can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Project,
    User,
    Format,
    Checklist,
    Photo,
}

impl EntityType {
    /// Capitalised name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::User => "User",
            Self::Format => "Format",
            Self::Checklist => "Checklist",
            Self::Photo => "Photo",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Project => "project",
            Self::User => "user",
            Self::Format => "format",
            Self::Checklist => "checklist",
            Self::Photo => "photo",
        };
        f.write_str(s)
    }
}

/// A single immutable entry in the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub user_id: String,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    /// Create an entry with a freshly generated id.
    pub fn new(
        user_id: impl Into<String>,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        details: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("activity_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.into(),
            action,
            entity_type,
            entity_id: entity_id.into(),
            details: details.into(),
            timestamp,
        }
    }
}
