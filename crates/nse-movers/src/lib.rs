//! nse-movers: download the NSE live-equity snapshot through a real browser
//! and compute top movers, 52-week proximity and 30-day leaders from it.

pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod error;
pub mod normalize;
pub mod renderer;
pub mod types;

pub use acquisition::{acquire, AcquisitionController, AcquisitionState};
pub use analysis::{MarketAnalyzer, Query, DEFAULT_RESULT_COUNT};
pub use config::{AcquisitionTimings, FileSelection, ScanConfig};
pub use error::{
    AcquisitionError, AcquisitionErrorKind, AnalysisError, DriverError, LoadError,
};
pub use normalize::{HeaderAliases, SchemaNormalizer};
pub use renderer::chromium::{find_chromium, ChromiumLauncher};
pub use renderer::{BrowserSession, ElementLocator, ElementRef, SessionLauncher};
pub use types::*;
