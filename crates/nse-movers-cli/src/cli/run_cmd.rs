//! Default command: acquire today's snapshot, then analyze it.

use anyhow::{Context, Result};

use super::{analyze_cmd, Settings};

pub async fn run(settings: &Settings, count: usize) -> Result<()> {
    let config = settings.scan_config();
    tracing::info!(
        "Downloading snapshot from {} into {}",
        config.source_url,
        config.download_dir.display()
    );

    let path = nse_movers::acquire(config)
        .await
        .context("snapshot download failed")?;

    analyze_cmd::analyze_file(&path, count)
}
