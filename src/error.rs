//! Error taxonomy for the crawler and the extraction worker.
//!
//! Errors are contained at the smallest scope that still lets the run move
//! forward: a bad part row is skipped, an unavailable leaf contributes nothing,
//! a failed selection drops its subtree. Only [`CrawlError`] ends a run.

use crate::page::PageError;

/// Low-level interaction that could not be completed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteractionError {
    #[error("{what} failed after {attempts} attempts: {last}")]
    Exhausted {
        what: String,
        attempts: u32,
        #[source]
        last: PageError,
    },

    #[error("{what} is not possible: {source}")]
    Impossible {
        what: String,
        #[source]
        source: PageError,
    },
}

/// A single UI transition failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error(transparent)]
    Interaction(#[from] InteractionError),

    #[error("Timed out waiting for {what}: {source}")]
    Wait {
        what: String,
        #[source]
        source: PageError,
    },

    #[error("Breadcrumb for depth {depth} unavailable ({available} rendered)")]
    BreadcrumbUnavailable { depth: usize, available: usize },

    #[error("Node {label:?} is no longer rendered at level {level}")]
    NodeVanished { label: String, level: usize },

    #[error("UI depth {actual} does not match navigation path depth {expected}")]
    DepthMismatch { expected: usize, actual: usize },

    #[error("Catalog root has not been activated")]
    NotActivated,
}

/// A malformed row in a leaf's part table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Part row {row}: {reason}")]
pub struct ExtractionParseError {
    pub row: usize,
    pub reason: String,
}

/// A leaf's part list never loaded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Part list for {locator} unavailable: {reason}")]
pub struct ResourceUnavailableError {
    pub locator: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that stop a run
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Could not enter the catalog root: {0}")]
    Root(#[source] NavigationError),

    #[error("Backtrack to depth {depth} failed at {path}: {source}")]
    Backtrack {
        depth: usize,
        path: String,
        #[source]
        source: NavigationError,
    },

    #[error("Navigation path drifted at {path}: expected depth {expected}, UI reports {actual}")]
    PathDrift {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Sink write failed: {0}")]
    Sink(#[from] SinkError),
}
