//! Fetch → transform → write, one page and one record at a time.

use indicatif::ProgressBar;

use crate::error::{FatalFetchError, SkipReason};
use crate::fetch::{Page, PageSource};
use crate::store::ProductStore;
use crate::transform::{RecordTransformer, TransformedRecord};
use crate::upsert::{UpsertWriter, WriteOutcome};

/// Where the run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunOutcome {
    #[default]
    Completed,
    Aborted { page: u32, error: FatalFetchError },
}

/// Counters accumulated over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages fetched successfully.
    pub pages: u32,
    /// Records received from upstream, usable or not.
    pub records: u64,
    pub created: u64,
    pub updated: u64,
    /// Records dropped by the transformer.
    pub skipped: u64,
    /// Records whose write was rolled back.
    pub failed: u64,
    pub outcome: RunOutcome,
}

impl RunSummary {
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, RunOutcome::Aborted { .. })
    }

    /// True when nothing failed and the run was not aborted.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.is_aborted()
    }
}

#[derive(Debug)]
pub enum PipelineState {
    Fetching(u32),
    Transforming(u32, Page),
    Writing {
        page: u32,
        records: Vec<Result<TransformedRecord, SkipReason>>,
        has_next: bool,
    },
    Done,
    Aborted { page: u32, error: FatalFetchError },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted { .. })
    }
}

pub struct IngestionPipeline<P, S> {
    source: P,
    transformer: RecordTransformer,
    writer: UpsertWriter<S>,
    search_terms: String,
    max_pages: Option<u32>,
    progress: ProgressBar,
    summary: RunSummary,
}

impl<P: PageSource, S: ProductStore> IngestionPipeline<P, S> {
    pub fn new(
        source: P,
        transformer: RecordTransformer,
        store: S,
        search_terms: impl Into<String>,
    ) -> Self {
        Self {
            source,
            transformer,
            writer: UpsertWriter::new(store),
            search_terms: search_terms.into(),
            max_pages: None,
            progress: ProgressBar::hidden(),
            summary: RunSummary::default(),
        }
    }

    /// Stop after this many pages even if upstream has more.
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Drive the state machine from `Fetching(1)` to a terminal state.
    pub async fn run(mut self) -> RunSummary {
        log::info!("Starting product pagination for '{}'", self.search_terms);
        if let Some(max_pages) = self.max_pages {
            log::info!("Limited to maximum {} pages", max_pages);
        }

        let mut state = PipelineState::Fetching(1);
        while !state.is_terminal() {
            state = self.step(state).await;
        }

        if let PipelineState::Aborted { page, error } = state {
            log::error!("Run aborted on page {}: {}", page, error);
            self.summary.outcome = RunOutcome::Aborted { page, error };
        }
        self.progress.finish_and_clear();

        let s = &self.summary;
        log::info!(
            "Pages fetched: {}, products seen: {}, created: {}, updated: {}, skipped: {}, failed: {}",
            s.pages,
            s.records,
            s.created,
            s.updated,
            s.skipped,
            s.failed
        );
        self.summary
    }

    /// Advance one transition.
    pub async fn step(&mut self, state: PipelineState) -> PipelineState {
        match state {
            PipelineState::Fetching(page) => self.fetch(page).await,
            PipelineState::Transforming(page, result) => self.transform(page, result),
            PipelineState::Writing {
                page,
                records,
                has_next,
            } => self.write(page, records, has_next),
            terminal => terminal,
        }
    }

    async fn fetch(&mut self, page: u32) -> PipelineState {
        if self.max_pages.is_some_and(|max| page > max) {
            return PipelineState::Done;
        }

        log::debug!("Fetching page {}", page);
        match self.source.fetch_page(&self.search_terms, page).await {
            Ok(result) => {
                self.summary.pages += 1;
                PipelineState::Transforming(page, result)
            }
            Err(error) => PipelineState::Aborted { page, error },
        }
    }

    fn transform(&mut self, page: u32, result: Page) -> PipelineState {
        if let (1, Some(total)) = (page, result.total_count) {
            log::info!("Found {} total products to fetch", total);
            self.progress.set_length(total);
        }

        self.summary.records += result.records.len() as u64;
        let records = result
            .records
            .iter()
            .map(|raw| self.transformer.transform(raw))
            .collect();

        PipelineState::Writing {
            page,
            records,
            has_next: result.has_next,
        }
    }

    fn write(
        &mut self,
        page: u32,
        records: Vec<Result<TransformedRecord, SkipReason>>,
        has_next: bool,
    ) -> PipelineState {
        let total = records.len();
        for (index, record) in records.into_iter().enumerate() {
            match record {
                Err(reason) => {
                    log::warn!("Skipping record {} on page {}: {}", index + 1, page, reason);
                    self.summary.skipped += 1;
                }
                Ok(record) => match self.writer.upsert(&record) {
                    Ok(WriteOutcome::Created) => {
                        log::debug!("Created product {}", record.barcode());
                        self.summary.created += 1;
                    }
                    Ok(WriteOutcome::Updated) => {
                        log::debug!("Updated product {}", record.barcode());
                        self.summary.updated += 1;
                    }
                    Err(e) => {
                        log::error!("{}", e);
                        self.summary.failed += 1;
                    }
                },
            }
            self.progress.inc(1);
        }
        log::info!("Page {}: processed {} products", page, total);

        if !has_next {
            log::debug!("No more products to fetch");
            return PipelineState::Done;
        }
        if self.max_pages.is_some_and(|max| page >= max) {
            log::warn!("Reached max page limit: {}", page);
            return PipelineState::Done;
        }
        PipelineState::Fetching(page + 1)
    }
}
