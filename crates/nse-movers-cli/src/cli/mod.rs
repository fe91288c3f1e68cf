//! Command implementations.

pub mod analyze_cmd;
pub mod doctor;
pub mod output;
pub mod run_cmd;

use std::path::PathBuf;

use nse_movers::config::expand_home;
use nse_movers::ScanConfig;

/// Global flags that shape the acquisition config.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub download_dir: Option<String>,
    pub user_agent: Option<String>,
    pub chromium: Option<String>,
    pub headless: bool,
}

impl Settings {
    /// Resolve flags against environment and defaults.
    pub fn scan_config(&self) -> ScanConfig {
        let mut config =
            ScanConfig::resolve(self.download_dir.as_deref(), self.user_agent.as_deref());
        if let Some(path) = &self.chromium {
            config.chromium_path = Some(expand_home(path));
        }
        config.headless = self.headless;
        config
    }

    /// Chromium binary that a run would use, if one can be found.
    pub fn chromium_binary(&self) -> Option<PathBuf> {
        self.scan_config()
            .chromium_path
            .filter(|p| p.exists())
            .or_else(nse_movers::find_chromium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let settings = Settings {
            download_dir: Some("/tmp/nse-cli".into()),
            user_agent: Some("CliAgent/2.0".into()),
            chromium: Some("/opt/chrome/chrome".into()),
            headless: false,
        };
        let config = settings.scan_config();
        assert_eq!(config.download_dir, PathBuf::from("/tmp/nse-cli"));
        assert_eq!(config.user_agent, "CliAgent/2.0");
        assert_eq!(config.chromium_path, Some(PathBuf::from("/opt/chrome/chrome")));
        assert!(!config.headless);
    }
}
