//! Run statistics for the discovery and extraction phases.
//!
//! Counts what each phase did and what it had to skip, so an operator can
//! tell a clean run from one that needs a narrow re-run.

use crate::models::Phase;
use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub phase: Phase,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub cancelled: bool,

    // Discovery
    pub nodes_selected: u64,
    pub leaves_reached: u64,
    pub index_rows_written: u64,
    pub index_rows_suppressed: u64,
    pub branches_pruned: u64,
    pub navigation_errors: u64,

    // Extraction
    pub leaves_extracted: u64,
    pub leaves_unavailable: u64,
    pub rows_before_cursor: u64,
    pub malformed_index_rows: u64,
    pub parse_errors: u64,
    pub part_records_written: u64,

    pub last_error: Option<String>,
}

impl RunStats {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            started_at: Local::now(),
            finished_at: None,
            cancelled: false,
            nodes_selected: 0,
            leaves_reached: 0,
            index_rows_written: 0,
            index_rows_suppressed: 0,
            branches_pruned: 0,
            navigation_errors: 0,
            leaves_extracted: 0,
            leaves_unavailable: 0,
            rows_before_cursor: 0,
            malformed_index_rows: 0,
            parse_errors: 0,
            part_records_written: 0,
            last_error: None,
        }
    }

    pub fn record_navigation_error(&mut self, error: String) {
        self.navigation_errors += 1;
        self.last_error = Some(error);
    }

    pub fn record_unavailable(&mut self, error: String) {
        self.leaves_unavailable += 1;
        self.last_error = Some(error);
    }

    pub fn record_parse_error(&mut self, error: String) {
        self.parse_errors += 1;
        self.last_error = Some(error);
    }

    pub fn finish(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
        self.finished_at = Some(Local::now());
    }

    /// Share of attempted leaves whose part list loaded, in percent
    pub fn availability_rate(&self) -> f64 {
        let attempted = self.leaves_extracted + self.leaves_unavailable;
        if attempted == 0 {
            0.0
        } else {
            (self.leaves_extracted as f64 / attempted as f64) * 100.0
        }
    }

    pub fn log_summary(&self) {
        match self.phase {
            Phase::Discovery => log::info!(
                "Discovery {}: {} nodes selected, {} leaves, {} index rows written ({} suppressed by resume), {} branches pruned, {} navigation errors",
                if self.cancelled { "cancelled" } else { "finished" },
                self.nodes_selected,
                self.leaves_reached,
                self.index_rows_written,
                self.index_rows_suppressed,
                self.branches_pruned,
                self.navigation_errors
            ),
            Phase::Extraction => log::info!(
                "Extraction {}: {} leaves extracted, {} unavailable ({:.2}% available), {} part records, {} parse errors, {} malformed index rows, {} rows before cursor",
                if self.cancelled { "cancelled" } else { "finished" },
                self.leaves_extracted,
                self.leaves_unavailable,
                self.availability_rate(),
                self.part_records_written,
                self.parse_errors,
                self.malformed_index_rows,
                self.rows_before_cursor
            ),
        }
        if let Some(last_error) = &self.last_error {
            log::info!("Last error: {}", last_error);
        }
        log::debug!("{}", self.export_json());
    }

    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
