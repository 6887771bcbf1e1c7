use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core::models::activity_entry::EntityType;

/// A record kept in one of the named catalog lists.
pub trait CatalogRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Store key of the list holding every record of this kind.
    const LIST_KEY: &'static str;
    /// Prefix for generated ids.
    const ID_PREFIX: &'static str;
    const ENTITY_TYPE: EntityType;

    fn id(&self) -> &str;
    fn name(&self) -> &str;

    /// Fields filled in on create when the request leaves them out.
    fn defaults() -> Map<String, Value> {
        Map::new()
    }
}

/// A construction project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub status: String,
    pub completion: u8,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CatalogRecord for Project {
    const LIST_KEY: &'static str = "projects_list";
    const ID_PREFIX: &'static str = "proj";
    const ENTITY_TYPE: EntityType = EntityType::Project;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn defaults() -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("status".into(), json!("Active"));
        fields.insert("completion".into(), json!(0));
        fields
    }
}

/// A person who can act as maker, checker or approver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CatalogRecord for User {
    const LIST_KEY: &'static str = "users_list";
    const ID_PREFIX: &'static str = "user";
    const ENTITY_TYPE: EntityType = EntityType::User;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A named template of checklist item texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub items: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CatalogRecord for Format {
    const LIST_KEY: &'static str = "formats_list";
    const ID_PREFIX: &'static str = "fmt";
    const ENTITY_TYPE: EntityType = EntityType::Format;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
