//! Grab engine: browser extraction, downloads and per-user persistence.
mod browser;
mod chrome;
mod config;
mod diagnostics;
mod engine;
mod fetch;
mod persist;
mod session;
mod types;
mod workspace;

pub use browser::{each_tolerant, first_success, Attempt, BrowserError, BrowserPage, Locator, RawAnchor};
pub use chrome::{ChromeSession, ChromeSettings};
pub use config::{
    Clock, PipelineConfig, SiteProfile, DEFAULT_SERVICE_URL, DIAGNOSTICS_DIR_NAME,
};
pub use diagnostics::{DiagnosticFiles, DiagnosticsWriter};
pub use engine::{ExtractorFactory, LinkExtractor, Orchestrator};
pub use fetch::{Downloader, FetchSettings, MediaFetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use session::{ChromeExtractorFactory, ExtractionSession, SessionFailure};
pub use types::{DownloadOutcome, FailureKind, FetchError, WorkerId};
pub use workspace::{Workspace, WorkspaceLocks, WorkspaceManager, RECORD_FILENAME};
