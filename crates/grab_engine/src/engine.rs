//! Worker pool: one browser session per worker, URLs handled one at a time
//! within a worker, workers running side by side.

use std::fs;
use std::sync::Arc;

use chrono::NaiveDate;
use engine_logging::{engine_error, engine_info, engine_warn};
use grab_core::{
    classify, partition_round_robin, resolve_user, DownloadRecord, ExtractedLink, MediaKind,
    RunSummary, UrlReport, UserId,
};
use tokio::task::JoinSet;

use crate::browser::BrowserError;
use crate::config::PipelineConfig;
use crate::fetch::{Downloader, ReqwestFetcher};
use crate::persist::PersistError;
use crate::session::ChromeExtractorFactory;
use crate::types::{DownloadOutcome, FetchError, WorkerId};
use crate::workspace::{Workspace, WorkspaceLocks, WorkspaceManager};

/// Produces links for one source URL. Owned by a single worker.
#[async_trait::async_trait]
pub trait LinkExtractor: Send {
    /// Never fails; problems are logged and yield an empty list.
    async fn extract(&mut self, source_url: &str, user_id: &UserId) -> Vec<ExtractedLink>;

    async fn shutdown(self: Box<Self>);
}

/// Opens the per-worker extractor (in production, a browser).
#[async_trait::async_trait]
pub trait ExtractorFactory: Send + Sync {
    async fn open(&self, worker: WorkerId) -> Result<Box<dyn LinkExtractor>, BrowserError>;
}

pub struct Orchestrator {
    ctx: WorkerContext,
}

#[derive(Clone)]
struct WorkerContext {
    config: Arc<PipelineConfig>,
    factory: Arc<dyn ExtractorFactory>,
    downloader: Downloader,
    workspaces: WorkspaceManager,
    locks: WorkspaceLocks,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        factory: Arc<dyn ExtractorFactory>,
        downloader: Downloader,
    ) -> Self {
        let workspaces = WorkspaceManager::new(config.output_root.clone());
        Self {
            ctx: WorkerContext {
                config: Arc::new(config),
                factory,
                downloader,
                workspaces,
                locks: WorkspaceLocks::new(),
            },
        }
    }

    /// Production wiring: Chrome for extraction, reqwest for downloads.
    pub fn with_chrome(config: PipelineConfig) -> Result<Self, FetchError> {
        let fetcher = ReqwestFetcher::new(config.fetch.clone())?;
        let downloader = Downloader::new(Arc::new(fetcher), config.fetch.retries);
        let factory = Arc::new(ChromeExtractorFactory::from_config(&config));
        Ok(Self::new(config, factory, downloader))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.ctx.config
    }

    /// Deal `urls` round-robin across the configured number of workers and
    /// wait for all of them. A failing worker never stops the others.
    pub async fn run(&self, urls: Vec<String>) -> RunSummary {
        let groups = partition_round_robin(&urls, self.ctx.config.parallelism);
        engine_info!(
            "Starting {} worker(s) for {} url(s)",
            groups.len(),
            urls.len()
        );

        let mut summary = RunSummary {
            workers: groups.len(),
            ..RunSummary::default()
        };

        let mut tasks = JoinSet::new();
        for (worker, group) in groups.into_iter().enumerate() {
            let ctx = self.ctx.clone();
            tasks.spawn(async move { ctx.run_worker(worker, group).await });
        }

        let mut finished: Vec<(WorkerId, Vec<UrlReport>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => finished.push(result),
                Err(err) => engine_error!("Worker task ended abnormally: {}", err),
            }
        }
        finished.sort_by_key(|(worker, _)| *worker);
        for report in finished.into_iter().flat_map(|(_, reports)| reports) {
            summary.push(report);
        }

        engine_info!("Run finished: {}", summary);
        summary
    }
}

impl WorkerContext {
    async fn run_worker(self, worker: WorkerId, urls: Vec<String>) -> (WorkerId, Vec<UrlReport>) {
        engine_info!("[worker {}] starting, {} url(s)", worker, urls.len());

        let mut extractor = match self.factory.open(worker).await {
            Ok(extractor) => extractor,
            Err(err) => {
                engine_error!("[worker {}] browser unavailable: {}", worker, err);
                let reports = urls
                    .iter()
                    .map(|url| {
                        UrlReport::new(worker, url.clone(), resolve_user(url))
                            .aborted(err.to_string())
                    })
                    .collect();
                return (worker, reports);
            }
        };

        let mut reports = Vec::with_capacity(urls.len());
        for url in &urls {
            reports.push(self.process_url(worker, extractor.as_mut(), url).await);
        }

        extractor.shutdown().await;
        engine_info!("[worker {}] finished", worker);
        (worker, reports)
    }

    async fn process_url(
        &self,
        worker: WorkerId,
        extractor: &mut dyn LinkExtractor,
        source_url: &str,
    ) -> UrlReport {
        let user_id = resolve_user(source_url);
        let mut report = UrlReport::new(worker, source_url, user_id.clone());
        engine_info!("[worker {}] URL: {} (user {})", worker, source_url, user_id);

        // Held until this URL is done so no other worker touches the same record.
        let _user_guard = self.locks.lock(&user_id).await;

        let workspace = match self.workspaces.open(&user_id) {
            Ok(workspace) => workspace,
            Err(err) => {
                engine_error!("[worker {}] workspace for {} unusable: {}", worker, user_id, err);
                return report.aborted(err.to_string());
            }
        };
        let mut record = workspace.load_record();

        let links = extractor.extract(source_url, &user_id).await;
        report.extracted = links.len();
        if links.is_empty() {
            engine_info!("[worker {}] No links found for {}", worker, source_url);
            return report;
        }

        let classified = classify(links);
        report.videos = classified.videos.len();
        report.images = classified.images.len();
        engine_info!(
            "[{}] found videos={} images={} total={}",
            user_id,
            report.videos,
            report.images,
            classified.total()
        );

        let date = (self.config.today)();
        for kind in [MediaKind::Video, MediaKind::Image] {
            let saved = self
                .download_bucket(
                    &workspace,
                    &mut record,
                    kind,
                    classified.bucket(kind),
                    date,
                    &mut report,
                )
                .await;
            if let Err(err) = saved {
                engine_error!(
                    "[worker {}] Download record for {} is not writable, skipping its remaining links: {}",
                    worker,
                    user_id,
                    err
                );
                return report.aborted(format!("download record not writable: {err}"));
            }
        }
        report
    }

    /// Download every link of one kind not already in the record. The record
    /// is written back after each saved file; if that write fails the file is
    /// removed again and the error returned, since nothing unrecorded may stay.
    async fn download_bucket(
        &self,
        workspace: &Workspace,
        record: &mut DownloadRecord,
        kind: MediaKind,
        links: &[ExtractedLink],
        date: NaiveDate,
        report: &mut UrlReport,
    ) -> Result<(), PersistError> {
        let mut index = 0;
        for link in links {
            if record.contains(kind, &link.href) {
                engine_info!("   - {:?} already downloaded, skipping: {}", kind, link.href);
                report.already_recorded += 1;
                continue;
            }

            let (slot, dest) = workspace.free_slot(kind, index, date);
            engine_info!("   - downloading {:?} -> {:?}", kind, dest);
            match self.downloader.download(&link.href, &dest).await {
                DownloadOutcome::Saved { path, .. } => {
                    record.insert(kind, link.href.clone());
                    if let Err(err) = workspace.save_record(record) {
                        report.failed += 1;
                        if let Err(remove_err) = fs::remove_file(&path) {
                            engine_warn!("Could not remove unrecorded {:?}: {}", path, remove_err);
                        }
                        return Err(err);
                    }
                    report.downloaded += 1;
                    index = slot + 1;
                }
                DownloadOutcome::Failed {
                    attempts,
                    last_error,
                } => {
                    engine_warn!(
                        "   failed to download {:?} after {} attempt(s): {} ({})",
                        kind,
                        attempts,
                        link.href,
                        last_error
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }
}
