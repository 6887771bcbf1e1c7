use std::path::PathBuf;

/// All domain errors for Sitecheck.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum SitecheckError {
    #[error("Checklist not found: {id}")]
    ChecklistNotFound { id: String },

    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: String, id: String },

    #[error("Photo not found: {id}")]
    PhotoNotFound { id: String },

    #[error("Invalid request: {detail}")]
    Validation { detail: String },

    #[error("Invalid storage key '{key}': only letters, digits, '_', '-' and '.' are allowed")]
    InvalidKey { key: String },

    #[error("Cannot {operation} checklist {id}: status is {status}")]
    InvalidTransition {
        id: String,
        operation: String,
        status: String,
    },

    #[error("Cannot {operation} checklist {id}: no {role} has been assigned")]
    RoleNotAssigned {
        id: String,
        operation: String,
        role: String,
    },

    #[error("User '{actor}' is not the {role} of checklist {id}")]
    Forbidden {
        id: String,
        actor: String,
        role: String,
    },

    #[error("Storage error: {detail}")]
    Storage { detail: String },

    #[error("Photo content missing from blob store: {path}")]
    BlobMissing { path: String },

    #[error(
        "Invalid configuration: {detail}\n\n  \
         Check {path} or run 'sitecheck init' to generate a fresh one."
    )]
    InvalidConfig { path: PathBuf, detail: String },

    #[error(
        "Sitecheck is not initialized in {path}\n\n  \
         Solutions:\n    \
         → Initialize a data directory: sitecheck init\n    \
         → Or point at an existing one: sitecheck --data-dir <path> ..."
    )]
    NotInitialized { path: PathBuf },

    #[error(
        "Sitecheck is already initialized in {path}\n\n  \
         Run 'sitecheck status' to inspect it, or 'sitecheck seed' to restore default data."
    )]
    AlreadyInitialized { path: PathBuf },

    #[error(
        "This data directory uses format version {data_version}, but your Sitecheck \
         only supports up to version {supported_version}.\n\n  \
         Solutions:\n    \
         → Upgrade Sitecheck: cargo install sitecheck --force"
    )]
    FormatVersionTooNew {
        data_version: u32,
        supported_version: u32,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Forbidden,
    Conflict,
    Storage,
}

impl SitecheckError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChecklistNotFound { .. }
            | Self::EntityNotFound { .. }
            | Self::PhotoNotFound { .. }
            | Self::BlobMissing { .. } => ErrorKind::NotFound,
            Self::Validation { .. } | Self::InvalidKey { .. } => ErrorKind::Validation,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InvalidTransition { .. } | Self::RoleNotAssigned { .. } => ErrorKind::Conflict,
            Self::Storage { .. }
            | Self::InvalidConfig { .. }
            | Self::NotInitialized { .. }
            | Self::AlreadyInitialized { .. }
            | Self::FormatVersionTooNew { .. }
            | Self::Json(_)
            | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// Shorthand for a `Validation` error.
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
        }
    }

    /// Shorthand for a `Storage` error.
    pub fn storage(detail: impl Into<String>) -> Self {
        Self::Storage {
            detail: detail.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SitecheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants_classify_as_not_found() {
        let err = SitecheckError::ChecklistNotFound { id: "cl_1".into() };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Checklist not found: cl_1");
    }

    #[test]
    fn workflow_conflicts_classify_as_conflict() {
        let err = SitecheckError::InvalidTransition {
            id: "cl_1".into(),
            operation: "approve".into(),
            status: "Draft".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("status is Draft"));
    }

    #[test]
    fn io_errors_are_storage_failures() {
        let err: SitecheckError = std::io::Error::other("disk full").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn invalid_key_is_a_validation_failure() {
        let err = SitecheckError::InvalidKey {
            key: "../etc".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
