//! Configuration loading and resolution.
//!
//! Every setting resolves as explicit value > environment variable > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::renderer::ElementLocator;

/// Page that publishes the live equity snapshot.
pub const DEFAULT_SOURCE_URL: &str = "https://www.nseindia.com/market-data/live-equity-market";

/// DOM id of the "download CSV" control on the source page.
pub const DEFAULT_DOWNLOAD_CONTROL_ID: &str = "dnldEquityStock";

/// Desktop user agent presented to the source site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

pub const ENV_DOWNLOAD_DIR: &str = "NSE_MOVERS_DOWNLOAD_DIR";
pub const ENV_USER_AGENT: &str = "NSE_MOVERS_USER_AGENT";
pub const ENV_CHROMIUM_PATH: &str = "NSE_MOVERS_CHROMIUM_PATH";

/// Bounded waits used by the acquisition sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionTimings {
    /// Upper bound for the initial page load.
    pub navigation_timeout: Duration,
    /// Upper bound for client-side rendering to settle after load.
    pub render_settle: Duration,
    /// Upper bound for the download control to become clickable.
    pub control_timeout: Duration,
    /// Upper bound for the downloaded file to land on disk.
    pub download_timeout: Duration,
    /// Interval between readiness checks.
    pub poll_interval: Duration,
}

impl Default for AcquisitionTimings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            render_settle: Duration::from_secs(5),
            control_timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Which file to return when several fresh files in the download directory match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileSelection {
    /// First match in directory listing order.
    #[default]
    FirstListed,
    /// Match with the newest modification time.
    MostRecent,
}

/// Everything the acquisition controller needs for one run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub download_dir: PathBuf,
    pub user_agent: String,
    pub source_url: String,
    pub download_control: ElementLocator,
    /// Extension of the expected file, without the dot.
    pub extension: String,
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub timings: AcquisitionTimings,
    pub file_selection: FileSelection,
}

impl ScanConfig {
    /// Build a config from optional explicit overrides, falling back to env and defaults.
    pub fn resolve(download_dir: Option<&str>, user_agent: Option<&str>) -> Self {
        Self {
            download_dir: resolve_download_dir(download_dir),
            user_agent: resolve_user_agent(user_agent),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            download_control: ElementLocator::Id(DEFAULT_DOWNLOAD_CONTROL_ID.to_string()),
            extension: "csv".to_string(),
            chromium_path: std::env::var(ENV_CHROMIUM_PATH).ok().map(PathBuf::from),
            headless: true,
            timings: AcquisitionTimings::default(),
            file_selection: FileSelection::default(),
        }
    }

    /// Create the download directory if it does not exist yet.
    pub fn ensure_download_dir(&self) -> std::io::Result<()> {
        if !self.download_dir.exists() {
            tracing::info!("Creating download directory: {}", self.download_dir.display());
            std::fs::create_dir_all(&self.download_dir)?;
        }
        Ok(())
    }
}

/// Resolve the download directory.
pub fn resolve_download_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(dir) = explicit {
        return expand_home(dir);
    }

    if let Ok(env_dir) = std::env::var(ENV_DOWNLOAD_DIR) {
        if !env_dir.trim().is_empty() {
            return expand_home(&env_dir);
        }
    }

    default_download_dir()
}

/// Resolve the user-agent string.
pub fn resolve_user_agent(explicit: Option<&str>) -> String {
    if let Some(ua) = explicit {
        return ua.to_string();
    }

    match std::env::var(ENV_USER_AGENT) {
        Ok(ua) if !ua.trim().is_empty() => ua,
        _ => DEFAULT_USER_AGENT.to_string(),
    }
}

fn default_download_dir() -> PathBuf {
    let base = dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("nse-movers")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let Some(rest) = path.strip_prefix('~') else {
        return PathBuf::from(path);
    };
    let Some(home) = dirs::home_dir() else {
        return PathBuf::from(path);
    };
    let rest = rest.trim_start_matches(['/', '\\']);
    if rest.is_empty() {
        home
    } else {
        home.join(Path::new(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_win() {
        let config = ScanConfig::resolve(Some("/tmp/nse"), Some("TestAgent/1.0"));
        assert_eq!(config.download_dir, PathBuf::from("/tmp/nse"));
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert_eq!(config.extension, "csv");
        assert!(config.headless);
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/Desktop/x"), home.join("Desktop/x"));
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("rel~"), PathBuf::from("rel~"));
    }

    #[test]
    fn test_default_timings() {
        let t = AcquisitionTimings::default();
        assert_eq!(t.control_timeout, Duration::from_secs(15));
        assert_eq!(t.download_timeout, Duration::from_secs(10));
        assert!(t.poll_interval < t.render_settle);
    }

    #[test]
    fn test_ensure_download_dir_creates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b");
        let mut config = ScanConfig::resolve(None, None);
        config.download_dir = target.clone();
        config.ensure_download_dir().unwrap();
        assert!(target.is_dir());
    }
}
