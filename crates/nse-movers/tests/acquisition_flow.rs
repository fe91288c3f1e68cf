//! Acquisition controller integration tests.
//!
//! Drives the controller against a scripted in-process browser session and
//! checks both the outcome and that the session was always quit.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use nse_movers::error::DriverResult;
use nse_movers::renderer::NavigationResult;
use nse_movers::*;

// ─────────────────────── helpers ───────────────────────

/// What the fake browser does at each step.
#[derive(Clone)]
struct Script {
    fail_start: bool,
    fail_navigation: bool,
    control_present: bool,
    stale_on_click: bool,
    panic_on_click: bool,
    /// File written into the download directory when the control is clicked.
    download: Option<(&'static str, &'static str)>,
    /// Delay between the click and the file landing on disk.
    delay: Option<Duration>,
    /// Never overwrite: repeat downloads get a ` (n)` suffix, as browsers do.
    numbered: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_start: false,
            fail_navigation: false,
            control_present: true,
            stale_on_click: false,
            panic_on_click: false,
            download: Some(("MW-NIFTY-TOTAL-MARKET.csv", SNAPSHOT)),
            delay: None,
            numbered: false,
        }
    }
}

/// Counters shared between the test and the fake session.
#[derive(Default)]
struct Counters {
    started: AtomicUsize,
    quit: AtomicUsize,
    escapes: AtomicUsize,
    clicks: AtomicUsize,
}

impl Counters {
    fn quits(&self) -> usize {
        self.quit.load(Ordering::SeqCst)
    }
}

struct FakeLauncher {
    script: Script,
    counters: Arc<Counters>,
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn start(
        &self,
        download_dir: &Path,
        _user_agent: &str,
    ) -> DriverResult<Box<dyn BrowserSession>> {
        if self.script.fail_start {
            return Err(DriverError::Init("no compatible browser binary".into()));
        }
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
            download_dir: download_dir.to_path_buf(),
        }))
    }
}

struct FakeSession {
    script: Script,
    counters: Arc<Counters>,
    download_dir: PathBuf,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> DriverResult<NavigationResult> {
        if self.script.fail_navigation {
            return Err(DriverError::Navigation(format!("{url}: dns error")));
        }
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn page_ready(&self) -> bool {
        true
    }

    async fn dismiss_overlay(&mut self) {
        self.counters.escapes.fetch_add(1, Ordering::SeqCst);
    }

    async fn check_clickable(&self, locator: &ElementLocator) -> DriverResult<Option<ElementRef>> {
        Ok(self.script.control_present.then(|| ElementRef {
            locator: locator.clone(),
        }))
    }

    async fn click(&mut self, element: &ElementRef) -> DriverResult<()> {
        self.counters.clicks.fetch_add(1, Ordering::SeqCst);
        if self.script.panic_on_click {
            panic!("renderer crashed");
        }
        if self.script.stale_on_click {
            return Err(DriverError::StaleElement(element.locator.to_string()));
        }
        if let Some((name, contents)) = self.script.download {
            let target = if self.script.numbered {
                unused_name(&self.download_dir, name)
            } else {
                self.download_dir.join(name)
            };
            match self.script.delay {
                Some(delay) => {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        std::fs::write(target, contents).unwrap();
                    });
                }
                None => std::fs::write(target, contents).unwrap(),
            }
        }
        Ok(())
    }

    async fn quit(self: Box<Self>) -> DriverResult<()> {
        self.counters.quit.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// `name`, or `stem (n).ext` for the first `n` not yet taken.
fn unused_name(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = name.rsplit_once('.').unwrap();
    (1..)
        .map(|n| dir.join(format!("{stem} ({n}).{ext}")))
        .find(|p| !p.exists())
        .unwrap()
}

const SNAPSHOT: &str = "SYMBOL,LTP,%CHNG,52W H,52W L,30 D   %CHNG\n\
                        A,70,5,100,50,1\n\
                        B,50,-3,100,45,7\n\
                        C,95,10,100,60,-2\n";

fn fast_config(dir: &Path) -> ScanConfig {
    let mut config = ScanConfig::resolve(dir.to_str(), Some("TestAgent/1.0"));
    config.source_url = "https://example.test/live-equity-market".into();
    config.timings = AcquisitionTimings {
        navigation_timeout: Duration::from_secs(1),
        render_settle: Duration::from_millis(50),
        control_timeout: Duration::from_millis(100),
        download_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(10),
    };
    config
}

fn controller(
    dir: &Path,
    script: Script,
) -> (AcquisitionController<FakeLauncher>, Arc<Counters>) {
    controller_with(fast_config(dir), script)
}

fn controller_with(
    config: ScanConfig,
    script: Script,
) -> (AcquisitionController<FakeLauncher>, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let launcher = FakeLauncher {
        script,
        counters: Arc::clone(&counters),
    };
    (AcquisitionController::new(launcher, config), counters)
}

// ═══════════════════════════════════════════════════════
// SUCCESS PATH
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_download_confirmed_and_browser_quit() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctl, counters) = controller(dir.path(), Script::default());

    let path = ctl.acquire().await.unwrap();

    assert_eq!(path, dir.path().join("MW-NIFTY-TOTAL-MARKET.csv"));
    assert_eq!(counters.started.load(Ordering::SeqCst), 1);
    assert_eq!(counters.escapes.load(Ordering::SeqCst), 1);
    assert_eq!(counters.clicks.load(Ordering::SeqCst), 1);
    assert_eq!(counters.quits(), 1);
    assert_eq!(
        ctl.history(),
        &[
            AcquisitionState::Idle,
            AcquisitionState::PageLoaded,
            AcquisitionState::OverlayDismissed,
            AcquisitionState::DownloadTriggered,
            AcquisitionState::FileConfirmed,
        ]
    );
}

#[tokio::test]
async fn test_missing_download_dir_is_created() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("nested/downloads");
    let (mut ctl, _counters) = controller(&dir, Script::default());

    let path = ctl.acquire().await.unwrap();
    assert!(dir.is_dir());
    assert!(path.starts_with(&dir));
}

#[tokio::test]
async fn test_acquired_file_feeds_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctl, _counters) = controller(dir.path(), Script::default());
    let path = ctl.acquire().await.unwrap();

    let mut analyzer = MarketAnalyzer::new(&path);
    analyzer.load().unwrap();
    assert_eq!(analyzer.top_gainers(2).unwrap().symbols(), vec!["C", "A"]);
    assert_eq!(analyzer.top_losers(2).unwrap().symbols(), vec!["B", "A"]);
    assert_eq!(
        analyzer.highest_returns_30d(1).unwrap().symbols(),
        vec!["B"]
    );
}

// ═══════════════════════════════════════════════════════
// FAILURE PATHS: browser must always be quit
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_no_file_is_file_not_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        download: None,
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let err = ctl.acquire().await.unwrap_err();

    assert_eq!(err.kind(), AcquisitionErrorKind::FileNotDownloaded);
    assert_eq!(counters.quits(), 1);
    assert_eq!(
        ctl.state(),
        AcquisitionState::Failed(AcquisitionErrorKind::FileNotDownloaded)
    );
    assert!(ctl.history().contains(&AcquisitionState::DownloadTriggered));
}

#[tokio::test]
async fn test_wrong_extension_is_file_not_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        download: Some(("snapshot.xlsx", "binary")),
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let err = ctl.acquire().await.unwrap_err();
    assert_eq!(err.kind(), AcquisitionErrorKind::FileNotDownloaded);
    assert_eq!(counters.quits(), 1);
}

#[tokio::test]
async fn test_absent_control_aborts_without_click() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        control_present: false,
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let err = ctl.acquire().await.unwrap_err();

    assert_eq!(err.kind(), AcquisitionErrorKind::DownloadControlNotFound);
    assert!(err.to_string().contains("#dnldEquityStock"));
    assert_eq!(counters.clicks.load(Ordering::SeqCst), 0);
    assert_eq!(counters.quits(), 1);
    assert!(!ctl.history().contains(&AcquisitionState::DownloadTriggered));
}

#[tokio::test]
async fn test_stale_control_is_control_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        stale_on_click: true,
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let err = ctl.acquire().await.unwrap_err();
    assert_eq!(err.kind(), AcquisitionErrorKind::DownloadControlNotFound);
    assert_eq!(counters.quits(), 1);
}

#[tokio::test]
async fn test_navigation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        fail_navigation: true,
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let err = ctl.acquire().await.unwrap_err();

    assert_eq!(err.kind(), AcquisitionErrorKind::Navigation);
    assert_eq!(counters.escapes.load(Ordering::SeqCst), 0);
    assert_eq!(counters.quits(), 1);
    assert_eq!(
        ctl.history(),
        &[
            AcquisitionState::Idle,
            AcquisitionState::Failed(AcquisitionErrorKind::Navigation),
        ]
    );
}

#[tokio::test]
async fn test_panic_inside_sequence_still_quits() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        panic_on_click: true,
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let err = ctl.acquire().await.unwrap_err();

    assert_eq!(err.kind(), AcquisitionErrorKind::Unexpected);
    assert!(err.to_string().contains("renderer crashed"));
    assert_eq!(counters.quits(), 1);
}

#[tokio::test]
async fn test_driver_init_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        fail_start: true,
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let err = ctl.acquire().await.unwrap_err();

    assert_eq!(err.kind(), AcquisitionErrorKind::DriverInit);
    assert!(err.to_string().contains("no compatible browser binary"));
    assert_eq!(counters.started.load(Ordering::SeqCst), 0);
    assert_eq!(counters.quits(), 0);
}

#[tokio::test]
async fn test_controller_is_reusable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let script = Script {
        numbered: true,
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let first = ctl.acquire().await.unwrap();
    let second = ctl.acquire().await.unwrap();

    assert_eq!(first, dir.path().join("MW-NIFTY-TOTAL-MARKET.csv"));
    assert_eq!(second, dir.path().join("MW-NIFTY-TOTAL-MARKET (1).csv"));
    assert_eq!(counters.started.load(Ordering::SeqCst), 2);
    assert_eq!(counters.quits(), 2);
    assert_eq!(ctl.history().len(), 5);
}

// ═══════════════════════════════════════════════════════
// LEFTOVER FILES FROM EARLIER RUNS
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_preexisting_csv_is_not_confirmed() {
    for selection in [FileSelection::FirstListed, FileSelection::MostRecent] {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("yesterday.csv");
        std::fs::write(&stale, "SYMBOL,%CHNG\nOLD,1\n").unwrap();

        let mut config = fast_config(dir.path());
        config.file_selection = selection;
        config.timings.download_timeout = Duration::from_secs(3);
        let script = Script {
            download: Some(("today.csv", SNAPSHOT)),
            delay: Some(Duration::from_millis(300)),
            ..Script::default()
        };
        let (mut ctl, counters) = controller_with(config, script);

        let path = ctl.acquire().await.unwrap();

        assert_eq!(path, dir.path().join("today.csv"), "{selection:?}");
        assert_eq!(counters.quits(), 1);
        assert_eq!(ctl.state(), AcquisitionState::FileConfirmed);
    }
}

#[tokio::test]
async fn test_only_stale_csv_is_file_not_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("yesterday.csv"), SNAPSHOT).unwrap();
    let script = Script {
        download: None,
        ..Script::default()
    };
    let (mut ctl, counters) = controller(dir.path(), script);

    let err = ctl.acquire().await.unwrap_err();

    assert_eq!(err.kind(), AcquisitionErrorKind::FileNotDownloaded);
    assert_eq!(counters.quits(), 1);
}
