use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::app::App;
use crate::config::app_config::AppConfig;
use crate::core::errors::{Result, SitecheckError};

/// Data directory used when neither `--data-dir` nor `SITECHECK_DATA_DIR` is set.
pub const DEFAULT_DATA_DIR: &str = ".sitecheck";

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the global data directory path.
/// If `custom` is provided, uses that path; otherwise defaults to `.sitecheck`.
pub fn init(custom: Option<&str>) {
    let dir = custom
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let _ = DATA_DIR.set(dir);
}

/// Get the current data directory path.
pub fn data_dir() -> &'static Path {
    DATA_DIR
        .get()
        .map(|p| p.as_path())
        .unwrap_or(Path::new(DEFAULT_DATA_DIR))
}

/// Load the configuration and open every service against the data directory.
pub fn open_app() -> Result<(AppConfig, App)> {
    let dir = data_dir();
    if !dir.exists() {
        return Err(SitecheckError::NotInitialized {
            path: dir.to_path_buf(),
        });
    }
    let config = AppConfig::load(dir)?;
    let app = App::open(dir, &config)?;
    Ok((config, app))
}
