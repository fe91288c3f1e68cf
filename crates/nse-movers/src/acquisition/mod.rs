//! Acquisition controller: drives one browser session through the fixed
//! navigation sequence that makes the source page hand over its CSV.
//!
//! `Idle → PageLoaded → OverlayDismissed → DownloadTriggered → FileConfirmed`,
//! or `Failed` from any step. The browser is quit before `acquire` returns on
//! every path, including a panic inside the sequence.

pub mod download;

pub use download::DirSnapshot;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Instant;

use futures::FutureExt;

use crate::config::ScanConfig;
use crate::error::{AcquisitionError, AcquisitionErrorKind, AcquisitionResult, DriverError};
use crate::renderer::chromium::ChromiumLauncher;
use crate::renderer::{BrowserSession, SessionLauncher};

/// Progress of one acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    PageLoaded,
    OverlayDismissed,
    DownloadTriggered,
    FileConfirmed,
    Failed(AcquisitionErrorKind),
}

/// Runs the acquisition sequence against sessions from `L`.
pub struct AcquisitionController<L: SessionLauncher> {
    launcher: L,
    config: ScanConfig,
    state: AcquisitionState,
    history: Vec<AcquisitionState>,
}

impl<L: SessionLauncher> AcquisitionController<L> {
    pub fn new(launcher: L, config: ScanConfig) -> Self {
        Self {
            launcher,
            config,
            state: AcquisitionState::Idle,
            history: vec![AcquisitionState::Idle],
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Last state reached.
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Every state reached during the last run, in order.
    pub fn history(&self) -> &[AcquisitionState] {
        &self.history
    }

    /// Download the snapshot and return its path.
    ///
    /// Failures are terminal for the run; nothing is retried.
    pub async fn acquire(&mut self) -> AcquisitionResult<PathBuf> {
        self.state = AcquisitionState::Idle;
        self.history = vec![AcquisitionState::Idle];
        let started = Instant::now();

        if let Err(e) = self.config.ensure_download_dir() {
            return self.fail(AcquisitionError::Unexpected(format!(
                "cannot create download directory {}: {e}",
                self.config.download_dir.display()
            )));
        }

        let mut session = match self
            .launcher
            .start(&self.config.download_dir, &self.config.user_agent)
            .await
        {
            Ok(session) => session,
            Err(e) => return self.fail(AcquisitionError::DriverInit(driver_message(e))),
        };
        tracing::info!("Browser started");

        let outcome = AssertUnwindSafe(self.drive(session.as_mut()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(AcquisitionError::Unexpected(panic_message(panic))));

        if let Err(e) = session.quit().await {
            tracing::warn!("Browser quit reported an error: {e}");
        }
        tracing::info!("Browser closed");

        match outcome {
            Ok(path) => {
                self.transition(AcquisitionState::FileConfirmed);
                tracing::info!(
                    "Snapshot downloaded to {} in {}ms",
                    path.display(),
                    started.elapsed().as_millis()
                );
                Ok(path)
            }
            Err(e) => self.fail(e),
        }
    }

    async fn drive(&mut self, session: &mut dyn BrowserSession) -> AcquisitionResult<PathBuf> {
        let timings = self.config.timings;
        let url = self.config.source_url.clone();

        let nav = session
            .navigate(&url, timings.navigation_timeout)
            .await
            .map_err(|e| match e {
                DriverError::Navigation(msg) => AcquisitionError::Navigation(msg),
                other => AcquisitionError::Unexpected(other.to_string()),
            })?;
        tracing::debug!("Loaded {} in {}ms", nav.final_url, nav.load_time_ms);
        self.transition(AcquisitionState::PageLoaded);
        self.settle_render(session).await;

        session.dismiss_overlay().await;
        self.transition(AcquisitionState::OverlayDismissed);

        let control = self.config.download_control.clone();
        let not_found = |_: DriverError| AcquisitionError::DownloadControlNotFound {
            locator: control.to_string(),
            timeout: timings.control_timeout,
        };
        let element = session
            .wait_for_clickable(&control, timings.control_timeout, timings.poll_interval)
            .await
            .map_err(not_found)?;
        let baseline = DirSnapshot::capture(&self.config.download_dir, &self.config.extension);
        session.click(&element).await.map_err(not_found)?;
        self.transition(AcquisitionState::DownloadTriggered);

        download::await_download(
            &self.config.download_dir,
            &self.config.extension,
            &baseline,
            self.config.file_selection,
            timings.download_timeout,
            timings.poll_interval,
        )
        .await
        .ok_or_else(|| AcquisitionError::FileNotDownloaded {
            dir: self.config.download_dir.clone(),
            extension: self.config.extension.clone(),
        })
    }

    /// Wait for the document to report ready, bounded by the render settle time.
    /// Proceeds regardless of the outcome.
    async fn settle_render(&self, session: &dyn BrowserSession) {
        let timings = self.config.timings;
        let deadline = Instant::now() + timings.render_settle;
        while Instant::now() < deadline {
            if session.page_ready().await {
                return;
            }
            tokio::time::sleep(timings.poll_interval).await;
        }
        tracing::debug!("Page not ready after {:?}; continuing", timings.render_settle);
    }

    fn transition(&mut self, next: AcquisitionState) {
        tracing::info!("Acquisition: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn fail<T>(&mut self, error: AcquisitionError) -> AcquisitionResult<T> {
        self.transition(AcquisitionState::Failed(error.kind()));
        tracing::error!("Acquisition failed: {error}");
        Err(error)
    }
}

/// Acquire the snapshot with a Chromium session built from `config`.
pub async fn acquire(config: ScanConfig) -> AcquisitionResult<PathBuf> {
    let launcher = ChromiumLauncher::from_config(&config);
    AcquisitionController::new(launcher, config).acquire().await
}

fn driver_message(e: DriverError) -> String {
    match e {
        DriverError::Init(msg) => msg,
        other => other.to_string(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic during acquisition".to_string()
    }
}
