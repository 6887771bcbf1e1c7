use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::SitecheckError;

/// What a photo is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoTarget {
    Inspection,
    Issue,
    Checklist,
}

impl PhotoTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inspection => "inspection",
            Self::Issue => "issue",
            Self::Checklist => "checklist",
        }
    }
}

impl fmt::Display for PhotoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoTarget {
    type Err = SitecheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inspection" => Ok(Self::Inspection),
            "issue" => Ok(Self::Issue),
            "checklist" => Ok(Self::Checklist),
            other => Err(SitecheckError::validation(format!(
                "unknown photo entity type '{other}' (expected inspection, issue or checklist)"
            ))),
        }
    }
}

/// Metadata for an uploaded photo. The bytes live in the blob store at `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: String,
    pub file_name: String,
    pub path: String,
    pub url: String,
    pub entity_type: PhotoTarget,
    pub entity_id: String,
    #[serde(default)]
    pub item_index: Option<usize>,
    pub uploaded_at: DateTime<Utc>,
    pub size: u64,
    pub content_type: String,
    pub sha256: String,
}
