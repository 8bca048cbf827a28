//! Leaf extraction: one part list per catalog index row.
//!
//! The worker walks the index in order, loads each leaf's part list through a
//! [`LeafSource`], parses it and appends the resulting records. A leaf that
//! never loads contributes nothing; a bad table row is skipped. Either way the
//! resume cursor moves past the leaf.

use crate::cancel::CancelToken;
use crate::catalog::selectors;
use crate::error::{CrawlError, ResourceUnavailableError};
use crate::metrics::RunStats;
use crate::models::{CatalogIndexRow, PartRecord, Phase, ResumeCursor};
use crate::page::{wait_for, Locator, Page};
use crate::parts::{expand_records, parse_part_table};
use crate::retry::{retry_interaction, RetryPolicy};
use crate::sink::{IndexEntry, RowSink};
use std::time::Duration;

/// Anything that can produce the rendered part list of a leaf
pub trait LeafSource {
    fn load_part_list(&mut self, row: &CatalogIndexRow) -> Result<String, ResourceUnavailableError>;
}

/// Loads part lists by navigating the browser straight to the diagram locator.
///
/// Locators differ only in the URL fragment, so the catalog app re-renders in
/// place and the previous leaf's `#ariPartList` can outlive the navigation.
/// It is removed before every navigation so the wait only sees a fresh render.
pub struct BrowserLeafSource<P: Page> {
    page: P,
    base_url: String,
    retry: RetryPolicy,
    wait: Duration,
    poll: Duration,
    settle: Duration,
}

impl<P: Page> BrowserLeafSource<P> {
    pub fn new(page: P, base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            page,
            base_url: base_url.to_string(),
            retry,
            wait: Duration::from_secs(20),
            poll: Duration::from_millis(250),
            settle: Duration::ZERO,
        }
    }

    pub fn with_wait(mut self, wait: Duration, poll: Duration) -> Self {
        self.wait = wait;
        self.poll = poll;
        self
    }

    /// Pause after each navigation before looking for the part list
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    fn leaf_url(&self, locator: &str) -> String {
        format!("{}{}", self.base_url, locator)
    }
}

impl<P: Page> LeafSource for BrowserLeafSource<P> {
    fn load_part_list(&mut self, row: &CatalogIndexRow) -> Result<String, ResourceUnavailableError> {
        let url = self.leaf_url(&row.diagram_locator);
        let part_list = Locator::css(selectors::PART_LIST);
        let what = format!("part list of {}", row.diagram_locator);

        log::debug!("Loading {}", url);
        retry_interaction(&self.retry, &what, || {
            let stale = self.page.remove_all(&part_list)?;
            if stale > 0 {
                log::trace!("Removed {} stale part list before loading {}", stale, url);
            }
            self.page.navigate(&url)?;
            if !self.settle.is_zero() {
                std::thread::sleep(self.settle);
            }
            wait_for(&self.page, &part_list, self.wait, self.poll)?;
            self.page.content()
        })
        .map_err(|e| ResourceUnavailableError {
            locator: row.diagram_locator.clone(),
            reason: e.to_string(),
        })
    }
}

pub struct ExtractionWorker<'a, L: LeafSource, S: RowSink<PartRecord>> {
    source: &'a mut L,
    sink: &'a mut S,
    cancel: CancelToken,
    stats: RunStats,
    cancelled: bool,
}

impl<'a, L: LeafSource, S: RowSink<PartRecord>> ExtractionWorker<'a, L, S> {
    pub fn new(source: &'a mut L, sink: &'a mut S) -> Self {
        Self {
            source,
            sink,
            cancel: CancelToken::new(),
            stats: RunStats::new(Phase::Extraction),
            cancelled: false,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Part records of one leaf; empty when the leaf is unavailable
    pub fn extract(&mut self, row: &CatalogIndexRow) -> Vec<PartRecord> {
        let html = match self.source.load_part_list(row) {
            Ok(html) => html,
            Err(e) => {
                log::warn!(
                    "Skipping leaf {} > {} > {} > {} > {}: {}",
                    row.brand,
                    row.year,
                    row.kind,
                    row.model,
                    row.diagram_label,
                    e
                );
                self.stats.record_unavailable(e.to_string());
                return Vec::new();
            }
        };
        self.stats.leaves_extracted += 1;

        let mut records = Vec::new();
        for line in parse_part_table(&html) {
            match line {
                Ok(line) => records.extend(expand_records(row, &line)),
                Err(e) => {
                    log::warn!("{} ({}): {}", row.diagram_locator, row.diagram_label, e);
                    self.stats.record_parse_error(format!("{}: {}", row.diagram_locator, e));
                }
            }
        }
        records
    }

    /// Extract every index entry at or after the cursor, advancing it per leaf
    pub fn run<I>(mut self, entries: I, cursor: &mut ResumeCursor) -> Result<RunStats, CrawlError>
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        log::info!("Extraction starting at index row {}", cursor.row_offset);

        let result = self.process(entries, cursor);
        let flushed = self.sink.flush();

        match result {
            Ok(()) => {
                flushed?;
                self.stats.finish(self.cancelled);
                self.stats.log_summary();
                Ok(self.stats)
            }
            Err(e) => {
                if let Err(flush_error) = flushed {
                    log::error!("Flushing part records failed: {}", flush_error);
                }
                self.stats.finish(true);
                self.stats.log_summary();
                log::error!("Extraction stopped before index row {}: {}", cursor.row_offset, e);
                Err(e)
            }
        }
    }

    fn process<I>(&mut self, entries: I, cursor: &mut ResumeCursor) -> Result<(), CrawlError>
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        for entry in entries {
            if !cursor.admits(entry.row_number) {
                self.stats.rows_before_cursor += 1;
                continue;
            }
            if self.cancel.is_cancelled() {
                log::info!("Extraction cancelled before index row {}", entry.row_number);
                self.cancelled = true;
                break;
            }

            match entry.row {
                Ok(row) => {
                    let records = self.extract(&row);
                    for record in &records {
                        self.sink.write_row(record)?;
                    }
                    self.sink.flush()?;
                    self.stats.part_records_written += records.len() as u64;
                    log::info!(
                        "Row {}: {} part records from {}",
                        entry.row_number,
                        records.len(),
                        row.diagram_label
                    );
                }
                Err(malformed) => {
                    log::warn!("Skipping index entry: {}", malformed);
                    self.stats.malformed_index_rows += 1;
                }
            }

            cursor.advance_to(entry.row_number + 1);
        }
        Ok(())
    }
}
