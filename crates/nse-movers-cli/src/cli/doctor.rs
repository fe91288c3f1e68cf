//! Environment readiness check.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{output, Settings};

/// Check Chromium availability and that the download directory is writable.
pub fn run(settings: &Settings) -> Result<()> {
    let config = settings.scan_config();
    let chromium = settings.chromium_binary();
    let download_dir = check_download_dir(&config.download_dir);
    let ready = chromium.is_some() && download_dir.is_ok();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "ready": ready,
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "download_dir": config.download_dir.display().to_string(),
            "download_dir_error": download_dir.as_ref().err(),
            "user_agent": config.user_agent,
            "source_url": config.source_url,
        }));
        return Ok(());
    }

    println!("nse-movers Doctor");
    println!("=================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set {}.",
            nse_movers::config::ENV_CHROMIUM_PATH
        ),
    }

    match &download_dir {
        Ok(()) => println!(
            "[OK] Download directory {} is writable",
            config.download_dir.display()
        ),
        Err(e) => println!("[!!] Download directory {}: {e}", config.download_dir.display()),
    }

    println!("[--] Source: {}", config.source_url);
    println!("[--] User agent: {}", config.user_agent);

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

/// Create the directory if needed and prove a file can be written into it.
fn check_download_dir(dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("cannot create: {e}"))?;
    let marker: PathBuf = dir.join(".nse-movers-doctor");
    std::fs::write(&marker, b"ok").map_err(|e| format!("not writable: {e}"))?;
    let _ = std::fs::remove_file(&marker);
    Ok(())
}
