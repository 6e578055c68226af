use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use engine_logging::engine_warn;
use grab_core::UserId;

use crate::browser::BrowserPage;
use crate::persist::AtomicFileWriter;
use crate::types::WorkerId;

/// Where a failed extraction left its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiagnosticFiles {
    pub screenshot: Option<PathBuf>,
    pub markup: Option<PathBuf>,
}

/// Saves a screenshot and the page markup after a failed extraction, named
/// `<timestamp>_w<worker>_<user>.{png,html}` so concurrent workers never clash.
#[derive(Clone)]
pub struct DiagnosticsWriter {
    dir: PathBuf,
    now: Arc<dyn Fn() -> DateTime<Local> + Send + Sync>,
}

impl DiagnosticsWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            now: Arc::new(Local::now),
        }
    }

    pub fn with_clock(mut self, now: Arc<dyn Fn() -> DateTime<Local> + Send + Sync>) -> Self {
        self.now = now;
        self
    }

    pub fn stem(&self, worker: WorkerId, user_id: &UserId) -> String {
        let stamp = (self.now)().format("%Y%m%dT%H%M%S%.3f");
        format!("{stamp}_w{worker}_{user_id}")
    }

    /// Best effort: artifacts that cannot be captured or written are skipped.
    pub async fn capture(
        &self,
        page: &dyn BrowserPage,
        worker: WorkerId,
        user_id: &UserId,
    ) -> DiagnosticFiles {
        let stem = self.stem(worker, user_id);
        let writer = AtomicFileWriter::new(self.dir.clone());
        let mut files = DiagnosticFiles::default();

        match page.screenshot().await {
            Ok(png) => match writer.write(&format!("{stem}.png"), &png) {
                Ok(path) => files.screenshot = Some(path),
                Err(err) => engine_warn!("Could not write screenshot for {}: {}", stem, err),
            },
            Err(err) => engine_warn!("Could not capture screenshot for {}: {}", stem, err),
        }

        match page.content().await {
            Ok(html) => match writer.write(&format!("{stem}.html"), html.as_bytes()) {
                Ok(path) => files.markup = Some(path),
                Err(err) => engine_warn!("Could not write page markup for {}: {}", stem, err),
            },
            Err(err) => engine_warn!("Could not read page markup for {}: {}", stem, err),
        }

        files
    }
}
