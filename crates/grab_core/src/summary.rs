use std::fmt;

use crate::UserId;

/// What happened to one source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReport {
    pub worker: usize,
    pub source_url: String,
    pub user_id: UserId,
    pub extracted: usize,
    pub videos: usize,
    pub images: usize,
    pub downloaded: usize,
    pub already_recorded: usize,
    pub failed: usize,
    /// Set when the URL could not be processed at all (no browser, no workspace).
    pub aborted: Option<String>,
}

impl UrlReport {
    pub fn new(worker: usize, source_url: impl Into<String>, user_id: UserId) -> Self {
        Self {
            worker,
            source_url: source_url.into(),
            user_id,
            extracted: 0,
            videos: 0,
            images: 0,
            downloaded: 0,
            already_recorded: 0,
            failed: 0,
            aborted: None,
        }
    }

    pub fn aborted(mut self, reason: impl Into<String>) -> Self {
        self.aborted = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub workers: usize,
    pub reports: Vec<UrlReport>,
}

impl RunSummary {
    pub fn push(&mut self, report: UrlReport) {
        self.reports.push(report);
    }

    pub fn urls(&self) -> usize {
        self.reports.len()
    }

    pub fn downloaded(&self) -> usize {
        self.reports.iter().map(|r| r.downloaded).sum()
    }

    pub fn already_recorded(&self) -> usize {
        self.reports.iter().map(|r| r.already_recorded).sum()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }

    pub fn without_links(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.aborted.is_none() && r.extracted == 0)
            .count()
    }

    pub fn aborted(&self) -> usize {
        self.reports.iter().filter(|r| r.aborted.is_some()).count()
    }

    /// Reports for one worker, in processing order.
    pub fn for_worker(&self, worker: usize) -> impl Iterator<Item = &UrlReport> {
        self.reports.iter().filter(move |r| r.worker == worker)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workers={} urls={} downloaded={} already_recorded={} failed={} no_links={} aborted={}",
            self.workers,
            self.urls(),
            self.downloaded(),
            self.already_recorded(),
            self.failed(),
            self.without_links(),
            self.aborted()
        )
    }
}
