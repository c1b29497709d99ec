//! Serve command implementation.

use minesync_server::{ServerConfig, SyncServer};
use tracing::info;

/// Runs the reference server until the process is stopped.
pub fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let storage = config
        .storage
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "memory".into());
    let server = SyncServer::new(config)?;
    let handle = server.start()?;

    info!(
        "serving manifest on {}, upload on {}, download on {} (storage: {})",
        handle.manifest_addr(),
        handle.upload_addr(),
        handle.download_addr(),
        storage
    );
    handle.wait()?;
    Ok(())
}
