use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::adapters::http::server::HttpServer;
use crate::cli::{context, output};
use crate::core::errors::{Result, SitecheckError};
use crate::core::services::seed_service;

/// Execute the `sitecheck serve` command.
///
/// Seeds any missing default data, then serves the JSON API until the
/// process is stopped.
pub fn execute(bind: Option<&str>) -> Result<()> {
    let (config, app) = context::open_app()?;

    let bind = bind.unwrap_or(&config.server.bind);
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| SitecheckError::validation(format!("invalid bind address '{bind}': {e}")))?;

    let report = seed_service::seed_defaults(&app.store)?;
    if !report.is_empty() {
        info!(
            projects = report.projects,
            users = report.users,
            formats = report.formats,
            "Restored missing default data"
        );
    }

    let policy = app.workflow.policy();
    info!(
        data_dir = %context::data_dir().display(),
        strict_transitions = policy.strict_transitions,
        enforce_roles = policy.enforce_roles,
        "Starting sitecheck"
    );
    output::success(&format!("Listening on http://{addr}"));

    let server = Arc::new(HttpServer::new(
        Arc::new(app),
        addr,
        config.photos.max_upload_bytes,
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server.run())
}
