//! One pass over the unlock service per source URL.
//!
//! Every interaction step is an ordered list of locators tried in turn. Only
//! navigation, the wait for the result list and reading the anchors can fail
//! the session; everything else degrades and moves on.

use std::fmt;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use grab_core::{advance, ExtractedLink, ExtractionEvent, ExtractionStage, UserId};

use crate::browser::{each_tolerant, first_success, BrowserError, BrowserPage, RawAnchor};
use crate::chrome::{ChromeSession, ChromeSettings};
use crate::config::{PipelineConfig, SiteProfile};
use crate::diagnostics::DiagnosticsWriter;
use crate::engine::{ExtractorFactory, LinkExtractor};
use crate::types::WorkerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub stage: ExtractionStage,
    pub error: BrowserError,
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (during {})", self.error, self.stage)
    }
}

pub struct ExtractionSession<P> {
    worker: WorkerId,
    page: P,
    site: SiteProfile,
    navigation_timeout: Duration,
    diagnostics: DiagnosticsWriter,
}

impl<P: BrowserPage> ExtractionSession<P> {
    pub fn new(
        worker: WorkerId,
        page: P,
        site: SiteProfile,
        navigation_timeout: Duration,
        diagnostics: DiagnosticsWriter,
    ) -> Self {
        Self {
            worker,
            page,
            site,
            navigation_timeout,
            diagnostics,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn into_page(self) -> P {
        self.page
    }

    /// Links offered by the service for `source_url`, in page order. Never
    /// fails: a broken session saves diagnostics and yields no links.
    pub async fn extract_links(&self, source_url: &str, user_id: &UserId) -> Vec<ExtractedLink> {
        match self.drive(source_url).await {
            Ok(links) => links,
            Err(failure) => {
                engine_warn!(
                    "[worker {}] Extraction failed for {}: {}",
                    self.worker,
                    source_url,
                    failure
                );
                let files = self
                    .diagnostics
                    .capture(&self.page, self.worker, user_id)
                    .await;
                if let Some(path) = files.screenshot.as_ref().or(files.markup.as_ref()) {
                    engine_warn!(
                        "[worker {}] Saved diagnostics next to {:?}",
                        self.worker,
                        path
                    );
                }
                Vec::new()
            }
        }
    }

    pub async fn drive(&self, source_url: &str) -> Result<Vec<ExtractedLink>, SessionFailure> {
        let page = &self.page;
        let site = &self.site;
        let mut stage = ExtractionStage::Navigating;

        page.goto(&site.service_url, self.navigation_timeout)
            .await
            .map_err(|error| SessionFailure { stage, error })?;
        tokio::time::sleep(site.settle_delay).await;

        let fill_timeout = site.fill_timeout;
        let filled = first_success("fill input", &site.input_locators, move |locator| {
            page.fill(locator, source_url, fill_timeout)
        })
        .await;
        if !filled.is_found() {
            engine_warn!(
                "[worker {}] No input accepted the url, continuing anyway",
                self.worker
            );
        }
        stage = self.step(
            stage,
            ExtractionEvent::InputAttempted {
                filled: filled.is_found(),
            },
        );

        let submit_timeout = site.submit_timeout;
        let submitted = first_success("submit", &site.submit_locators, move |locator| {
            page.click(locator, submit_timeout)
        })
        .await;
        stage = self.step(
            stage,
            ExtractionEvent::SubmitAttempted {
                clicked: submitted.is_found(),
            },
        );

        tokio::time::sleep(site.settle_delay).await;
        self.clear_interstitials().await;
        stage = self.step(stage, ExtractionEvent::InterstitialsHandled);

        page.wait_for(&site.result_ready, self.navigation_timeout)
            .await
            .map_err(|error| SessionFailure { stage, error })?;
        let anchors = page
            .anchors(&site.result_anchors)
            .await
            .map_err(|error| SessionFailure { stage, error })?;
        self.step(stage, ExtractionEvent::ResultsListed);

        Ok(links_from_anchors(anchors))
    }

    fn step(&self, stage: ExtractionStage, event: ExtractionEvent) -> ExtractionStage {
        let next = advance(stage, event);
        engine_debug!("[worker {}] {} -> {}", self.worker, stage, next);
        next
    }

    /// Close pop-up tabs and click away overlays. Nothing here is an error.
    async fn clear_interstitials(&self) {
        match self.page.close_other_pages().await {
            Ok(0) => {}
            Ok(closed) => engine_info!("[worker {}] Closed {} pop-up tab(s)", self.worker, closed),
            Err(err) => engine_debug!("[worker {}] Could not list pages: {}", self.worker, err),
        }

        let page = &self.page;
        let dismiss_timeout = self.site.dismiss_timeout;
        let dismissed = each_tolerant("dismiss", &self.site.dismiss_locators, move |locator| {
            page.click(locator, dismiss_timeout)
        })
        .await;
        if dismissed > 0 {
            engine_debug!("[worker {}] Dismissed {} overlay(s)", self.worker, dismissed);
        }
    }
}

/// Anchors without an href are dropped; page order is kept.
fn links_from_anchors(anchors: Vec<RawAnchor>) -> Vec<ExtractedLink> {
    anchors
        .into_iter()
        .filter_map(|anchor| {
            let href = anchor.href.filter(|href| !href.trim().is_empty())?;
            Some(ExtractedLink {
                label: anchor.title,
                href,
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl LinkExtractor for ExtractionSession<ChromeSession> {
    async fn extract(&mut self, source_url: &str, user_id: &UserId) -> Vec<ExtractedLink> {
        self.extract_links(source_url, user_id).await
    }

    async fn shutdown(self: Box<Self>) {
        self.into_page().shutdown().await;
    }
}

/// Launches one Chrome per worker.
#[derive(Clone)]
pub struct ChromeExtractorFactory {
    chrome: ChromeSettings,
    site: SiteProfile,
    navigation_timeout: Duration,
    diagnostics: DiagnosticsWriter,
}

impl ChromeExtractorFactory {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            chrome: config.chrome.clone(),
            site: config.site.clone(),
            navigation_timeout: config.navigation_timeout,
            diagnostics: DiagnosticsWriter::new(config.diagnostics_dir.clone()),
        }
    }
}

#[async_trait::async_trait]
impl ExtractorFactory for ChromeExtractorFactory {
    async fn open(&self, worker: WorkerId) -> Result<Box<dyn LinkExtractor>, BrowserError> {
        let page = ChromeSession::launch(worker, &self.chrome).await?;
        Ok(Box::new(ExtractionSession::new(
            worker,
            page,
            self.site.clone(),
            self.navigation_timeout,
            self.diagnostics.clone(),
        )))
    }
}
