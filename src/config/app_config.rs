use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::adapters::activity::kv_activity_log::DEFAULT_RETAIN;
use crate::core::errors::{Result, SitecheckError};
use crate::core::services::photo_service::DEFAULT_MAX_UPLOAD_BYTES;
use crate::core::services::workflow_service::WorkflowPolicy;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Current format version supported by this build of Sitecheck.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Configuration written by `sitecheck init`.
pub const DEFAULT_CONFIG: &str = r#"[sitecheck]
version = "0.1.0"
format_version = 1

[server]
bind = "127.0.0.1:8080"

[workflow]
# Accept each step only from its predecessor state.
strict_transitions = false
# Require the X-User-Id header to match the role that owns each step.
enforce_roles = false

[activity]
retain = 1000

[photos]
dir = "photos"
max_upload_bytes = 10485760
"#;

/// Top-level Sitecheck configuration read from `<data-dir>/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sitecheck: SitecheckSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub activity: ActivitySection,
    #[serde(default)]
    pub photos: PhotosSection,
}

impl AppConfig {
    /// Load the configuration from `<data-dir>/config.toml`.
    ///
    /// After parsing, validates the photo directory name to prevent path
    /// traversal from a tampered config file.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(SitecheckError::NotInitialized {
                path: data_dir.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(&config_path)?;
        Self::parse(&content, &config_path)
    }

    /// Parse and validate configuration text. `path` is only used in errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let invalid = |detail: String| SitecheckError::InvalidConfig {
            path: path.to_path_buf(),
            detail,
        };

        let config: Self =
            toml::from_str(content).map_err(|e| invalid(format!("Failed to parse: {e}")))?;

        // Check format version compatibility
        if config.sitecheck.format_version > CURRENT_FORMAT_VERSION {
            return Err(SitecheckError::FormatVersionTooNew {
                data_version: config.sitecheck.format_version,
                supported_version: CURRENT_FORMAT_VERSION,
            });
        }

        if config.activity.retain == 0 {
            return Err(invalid("activity.retain must be at least 1".into()));
        }

        validate_simple_dir_name(&config.photos.dir)
            .map_err(|detail| invalid(format!("photos.dir {detail}")))?;

        config
            .server
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| invalid(format!("server.bind '{}': {e}", config.server.bind)))?;

        Ok(config)
    }

    /// Directory that photo bytes are written to.
    pub fn photos_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.photos.dir)
    }
}

/// Reject anything but a single plain directory name.
fn validate_simple_dir_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("cannot be empty".into());
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) || name.contains("..") {
        return Err(format!("'{name}' must be a simple directory name"));
    }
    if name == "store" {
        return Err("'store' is reserved for the record store".into());
    }
    Ok(())
}

/// The `[sitecheck]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SitecheckSection {
    pub version: String,
    /// Format version for backward compatibility. Defaults to 1 if missing.
    #[serde(default = "default_format_version")]
    pub format_version: u32,
}

fn default_format_version() -> u32 {
    1
}

/// The `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// The `[workflow]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowSection {
    #[serde(default)]
    pub strict_transitions: bool,
    #[serde(default)]
    pub enforce_roles: bool,
}

impl WorkflowSection {
    pub fn policy(&self) -> WorkflowPolicy {
        WorkflowPolicy {
            strict_transitions: self.strict_transitions,
            enforce_roles: self.enforce_roles,
        }
    }
}

/// The `[activity]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivitySection {
    #[serde(default = "default_retain")]
    pub retain: usize,
}

fn default_retain() -> usize {
    DEFAULT_RETAIN
}

impl Default for ActivitySection {
    fn default() -> Self {
        Self {
            retain: default_retain(),
        }
    }
}

/// The `[photos]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotosSection {
    #[serde(default = "default_photos_dir")]
    pub dir: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_photos_dir() -> String {
    "photos".into()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for PhotosSection {
    fn default() -> Self {
        Self {
            dir: default_photos_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<AppConfig> {
        AppConfig::parse(content, Path::new("config.toml"))
    }

    #[test]
    fn default_config_parses() {
        let config = parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.workflow.policy(), WorkflowPolicy::default());
        assert_eq!(config.activity.retain, 1000);
        assert_eq!(config.photos.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn only_sitecheck_section_is_required() {
        let config = parse("[sitecheck]\nversion = \"0.1.0\"\n").unwrap();
        assert_eq!(config.sitecheck.format_version, 1);
        assert_eq!(config.photos.dir, "photos");
        assert!(!config.workflow.strict_transitions);

        assert!(parse("[server]\nbind = \"0.0.0.0:80\"\n").is_err());
    }

    #[test]
    fn newer_format_is_refused() {
        let err = parse("[sitecheck]\nversion = \"9.0.0\"\nformat_version = 2\n").unwrap_err();
        assert!(matches!(
            err,
            SitecheckError::FormatVersionTooNew {
                data_version: 2,
                supported_version: 1
            }
        ));
    }

    #[test]
    fn photo_dir_traversal_is_refused() {
        for dir in ["../outside", "a/b", "..", "", "store"] {
            let content = format!("[sitecheck]\nversion = \"0.1.0\"\n[photos]\ndir = \"{dir}\"\n");
            let err = parse(&content).unwrap_err();
            assert!(matches!(err, SitecheckError::InvalidConfig { .. }), "{dir}");
        }
    }

    #[test]
    fn zero_retain_is_refused() {
        let err = parse("[sitecheck]\nversion = \"0.1.0\"\n[activity]\nretain = 0\n").unwrap_err();
        assert!(err.to_string().contains("activity.retain"));
    }

    #[test]
    fn bad_bind_is_refused() {
        let err = parse("[sitecheck]\nversion = \"0.1.0\"\n[server]\nbind = \"localhost\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("server.bind"));
    }

    #[test]
    fn missing_config_means_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, SitecheckError::NotInitialized { .. }));
    }
}
