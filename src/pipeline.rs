use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::dedup;
use crate::error::{ConfigError, ScrapeError, StoreError};
use crate::fetch::PageSource;
use crate::parser::{self, extract::Selectors, normalize::Context};
use crate::reconcile::{self, Policy};
use crate::settings::Settings;
use crate::store::{Snapshot, Store};

/// Where a run is. `Failed` is terminal and reachable from every other stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    SnapshotRead,
    Fetch,
    Parse,
    Filter,
    Write,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::SnapshotRead => "snapshot read",
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Filter => "filter",
            Stage::Write => "write",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A run that stopped. `stage` is the step that failed.
#[derive(Debug, Error)]
#[error("run failed during {stage}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Valid links found on the page, duplicates included.
    pub scraped: usize,
    /// Links neither repeated on the page nor already stored.
    pub new: usize,
    /// Links from this run now persisted.
    pub written: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scraped {}, new {}, written {}.",
            self.scraped, self.new, self.written
        )
    }
}

pub struct Pipeline<F, S> {
    source: Url,
    default_title: String,
    selectors: Selectors,
    policy: Policy,
    fetcher: F,
    store: S,
    dry_run: bool,
    stage: Stage,
}

impl<F: PageSource, S: Store> Pipeline<F, S> {
    pub fn new(settings: &Settings, fetcher: F, store: S) -> Result<Self, RunError> {
        let init_failed = |source: StageError| RunError { stage: Stage::Init, source };

        let source = Url::parse(&settings.source_url)
            .map_err(|_| init_failed(ConfigError::SourceUrl(settings.source_url.clone()).into()))?;
        let selectors = Selectors::from_settings(settings).map_err(|e| init_failed(e.into()))?;

        Ok(Pipeline {
            source,
            default_title: settings.default_title.clone(),
            selectors,
            policy: settings.policy(),
            fetcher,
            store,
            dry_run: false,
            stage: Stage::Init,
        })
    }

    /// Compute everything but skip the write.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[cfg(test)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// One complete run. Either everything up to the write succeeds, or the
    /// store is left as it was.
    pub async fn run(&mut self, run_date: NaiveDate) -> Result<RunSummary, RunError> {
        self.stage = Stage::Init;
        match self.execute(run_date).await {
            Ok(summary) => {
                self.advance(Stage::Done);
                Ok(summary)
            }
            Err(source) => {
                let stage = self.stage;
                self.advance(Stage::Failed);
                Err(RunError { stage, source })
            }
        }
    }

    async fn execute(&mut self, run_date: NaiveDate) -> Result<RunSummary, StageError> {
        self.advance(Stage::SnapshotRead);
        let snapshot = if self.dry_run {
            Snapshot::from_rows(self.store.read_existing()?)
        } else {
            self.store.read_snapshot()?
        };
        info!(rows = snapshot.rows.len(), "read store snapshot");

        self.advance(Stage::Fetch);
        let html = self.fetcher.fetch(self.source.as_str()).await?;

        self.advance(Stage::Parse);
        let ctx = Context {
            source: &self.source,
            default_title: &self.default_title,
            run_date,
        };
        let scraped = parser::parse_page(&html, &self.selectors, &ctx)?;

        self.advance(Stage::Filter);
        let scraped_count = scraped.len();
        let new_records = dedup::new_records(scraped, &snapshot.keys);
        let mut summary = RunSummary {
            scraped: scraped_count,
            new: new_records.len(),
            written: 0,
        };
        info!(scraped = summary.scraped, new = summary.new, "filtered links");

        self.advance(Stage::Write);
        let plan = reconcile::plan(new_records, snapshot, self.policy);
        if self.dry_run {
            info!(would_write = plan.new_rows(), "dry run, store left untouched");
        } else {
            summary.written = reconcile::apply(&plan, &self.store)?;
            if let Some(total) = plan.resulting_rows() {
                info!(written = summary.written, total, "rewrote window");
            } else {
                info!(written = summary.written, "appended links");
            }
        }

        Ok(summary)
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "stage");
        self.stage = next;
    }
}
