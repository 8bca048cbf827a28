//! Depth-first discovery of every leaf in the catalog tree.
//!
//! The walk keeps an explicit stack of levels. Each frame remembers which
//! siblings are still to be visited, never where they were rendered: before
//! every selection the level is listed again and the sibling is found by its
//! opaque id, because any click or breadcrumb jump may re-render the DOM.
//!
//! Failures are contained per subtree. A failed selection or harvest is logged
//! and the walk continues with the next sibling once the UI is back at the
//! parent depth. If that depth cannot be re-established the run stops, after
//! flushing the rows already written.

use crate::cancel::CancelToken;
use crate::catalog::{CatalogUi, SelectOutcome};
use crate::error::{CrawlError, NavigationError};
use crate::metrics::RunStats;
use crate::models::{CatalogIndexRow, LeafItem, NavigationPath, Phase, SelectorNode};
use crate::sink::RowSink;
use std::collections::VecDeque;

/// Inclusive year bounds applied to the first level only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl YearRange {
    pub fn new(min: Option<i32>, max: Option<i32>) -> Self {
        Self { min, max }
    }

    /// Bounds given on the command line win over configured ones
    pub fn overridden(self, min: Option<i32>, max: Option<i32>) -> Self {
        Self {
            min: min.or(self.min),
            max: max.or(self.max),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Labels that are not years are only admitted by an unbounded range
    pub fn admits(&self, label: &str) -> bool {
        if self.is_unbounded() {
            return true;
        }
        match label.trim().parse::<i32>() {
            Ok(year) => {
                self.min.map_or(true, |min| year >= min) && self.max.map_or(true, |max| year <= max)
            }
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub brand_key: String,
    pub brand_label: String,
    pub years: YearRange,
    /// Last row an earlier run wrote. Every row up to and including it in the
    /// re-walk is suppressed, so subtrees that failed back then stay aligned.
    pub resume_after: Option<CatalogIndexRow>,
}

impl DiscoveryOptions {
    pub fn new(brand_key: &str, brand_label: &str) -> Self {
        Self {
            brand_key: brand_key.to_string(),
            brand_label: brand_label.to_string(),
            years: YearRange::default(),
            resume_after: None,
        }
    }
}

struct Frame {
    level: usize,
    pending: VecDeque<SelectorNode>,
}

enum Step {
    Children(Vec<SelectorNode>),
    Leaf,
}

enum StepError {
    Navigation(NavigationError),
    Fatal(CrawlError),
}

impl From<NavigationError> for StepError {
    fn from(e: NavigationError) -> Self {
        StepError::Navigation(e)
    }
}

impl From<CrawlError> for StepError {
    fn from(e: CrawlError) -> Self {
        StepError::Fatal(e)
    }
}

pub struct DiscoveryCrawler<'a, C: CatalogUi, S: RowSink<CatalogIndexRow>> {
    ui: &'a mut C,
    sink: &'a mut S,
    options: DiscoveryOptions,
    cancel: CancelToken,
    stats: RunStats,
    suppress_through: Option<CatalogIndexRow>,
    cancelled: bool,
}

impl<'a, C: CatalogUi, S: RowSink<CatalogIndexRow>> DiscoveryCrawler<'a, C, S> {
    pub fn new(ui: &'a mut C, sink: &'a mut S, options: DiscoveryOptions) -> Self {
        let suppress_through = options.resume_after.clone();
        Self {
            ui,
            sink,
            options,
            cancel: CancelToken::new(),
            stats: RunStats::new(Phase::Discovery),
            suppress_through,
            cancelled: false,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk the whole tree, writing one index row per diagram in pre-order
    pub fn run(mut self) -> Result<RunStats, CrawlError> {
        if let Some(last) = &self.suppress_through {
            log::info!(
                "Resuming discovery after {} > {} > {} > {} ({})",
                last.year,
                last.kind,
                last.model,
                last.diagram_label,
                last.diagram_locator
            );
        }

        let result = self.walk();
        if result.is_ok() && !self.cancelled {
            if let Some(last) = &self.suppress_through {
                log::warn!(
                    "Resume row {} was not found again; {} rows suppressed, none written",
                    last.diagram_locator,
                    self.stats.index_rows_suppressed
                );
                self.stats.last_error = Some(format!("resume row {} not found", last.diagram_locator));
            }
        }
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
                    log::error!("Flushing the catalog index failed: {}", flush_error);
                }
                self.stats.finish(true);
                self.stats.log_summary();
                log::error!("Discovery stopped: {}", e);
                Err(e)
            }
        }
    }

    fn walk(&mut self) -> Result<(), CrawlError> {
        self.ui
            .activate_root(&self.options.brand_key)
            .map_err(CrawlError::Root)?;

        let mut path = NavigationPath::new(self.options.brand_label.clone());
        let roots = self.ui.list_level(0).map_err(CrawlError::Root)?;
        log::info!(
            "Years available: {:?}",
            roots.iter().map(|n| n.label.as_str()).collect::<Vec<_>>()
        );
        let roots = self.prune(roots);

        let mut stack = vec![Frame {
            level: 0,
            pending: roots.into(),
        }];

        while let Some(frame) = stack.last_mut() {
            let level = frame.level;
            let Some(expected) = frame.pending.pop_front() else {
                stack.pop();
                if level > 0 {
                    path.truncate(level - 1);
                    self.backtrack(level - 1, &path)?;
                }
                continue;
            };

            if self.cancel.is_cancelled() {
                log::info!("Discovery cancelled at {}", path);
                self.cancelled = true;
                break;
            }

            match self.descend(&expected, &mut path) {
                Ok(Step::Children(nodes)) => stack.push(Frame {
                    level: level + 1,
                    pending: nodes.into(),
                }),
                Ok(Step::Leaf) => {}
                Err(StepError::Fatal(e)) => return Err(e),
                Err(StepError::Navigation(e)) => {
                    path.truncate(level);
                    log::warn!("Skipping subtree {} > {}: {}", path, expected.label, e);
                    self.stats
                        .record_navigation_error(format!("{} > {}: {}", path, expected.label, e));
                    self.recover(level, &path)?;
                }
            }
        }

        Ok(())
    }

    fn prune(&mut self, roots: Vec<SelectorNode>) -> Vec<SelectorNode> {
        let years = self.options.years;
        roots
            .into_iter()
            .filter(|node| {
                let keep = years.admits(&node.label);
                if !keep {
                    log::debug!("Pruning year {:?} outside {:?}", node.label, years);
                    self.stats.branches_pruned += 1;
                }
                keep
            })
            .collect()
    }

    /// Select `expected` at its level and handle whatever renders next
    fn descend(
        &mut self,
        expected: &SelectorNode,
        path: &mut NavigationPath,
    ) -> Result<Step, StepError> {
        let level = expected.level_index;
        let siblings = self.ui.list_level(level)?;
        let position = siblings
            .iter()
            .position(|n| n.opaque_id == expected.opaque_id)
            .or_else(|| siblings.iter().position(|n| n.label == expected.label))
            .ok_or_else(|| NavigationError::NodeVanished {
                label: expected.label.clone(),
                level,
            })?;
        let node = &siblings[position];

        let outcome = self.ui.select(node)?;
        self.stats.nodes_selected += 1;
        path.push(node.label.clone());
        log::debug!("Selected {}", path);

        let actual = self.ui.current_depth()?;
        if actual != path.len() {
            return Err(NavigationError::DepthMismatch {
                expected: path.len(),
                actual,
            }
            .into());
        }

        match outcome {
            SelectOutcome::MoreLevels(nodes) => Ok(Step::Children(nodes)),
            SelectOutcome::LeafReached => {
                self.stats.leaves_reached += 1;
                let items = self.ui.harvest_leaf_items()?;
                log::info!("{}: {} diagrams", path, items.len());
                self.write_rows(path, &items)?;
                path.pop();
                self.backtrack(level, path)?;
                Ok(Step::Leaf)
            }
        }
    }

    fn write_rows(&mut self, path: &NavigationPath, items: &[LeafItem]) -> Result<(), CrawlError> {
        for item in items {
            let row = CatalogIndexRow::from_path(path, item);
            if self.suppress_through.is_some() {
                if self.suppress_through.as_ref() == Some(&row) {
                    log::info!("Reached the last row of the earlier run, writing from here on");
                    self.suppress_through = None;
                }
                self.stats.index_rows_suppressed += 1;
                continue;
            }
            self.sink.write_row(&row)?;
            self.stats.index_rows_written += 1;
        }
        self.sink.flush()?;
        Ok(())
    }

    /// Bring the UI back to `depth` after a failure below it
    fn recover(&mut self, depth: usize, path: &NavigationPath) -> Result<(), CrawlError> {
        let actual = self.ui.current_depth().map_err(|source| CrawlError::Backtrack {
            depth,
            path: path.to_string(),
            source,
        })?;
        if actual == depth {
            return Ok(());
        }
        self.backtrack(depth, path)
    }

    fn backtrack(&mut self, depth: usize, path: &NavigationPath) -> Result<(), CrawlError> {
        let backtrack_error = |source| CrawlError::Backtrack {
            depth,
            path: path.to_string(),
            source,
        };
        self.ui.navigate_back(depth).map_err(backtrack_error)?;

        let actual = self.ui.current_depth().map_err(backtrack_error)?;
        if actual != path.len() {
            return Err(CrawlError::PathDrift {
                path: path.to_string(),
                expected: path.len(),
                actual,
            });
        }
        Ok(())
    }
}
