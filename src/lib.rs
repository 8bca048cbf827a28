//! Crawler and part-list extractor for the Lynx electronic parts catalog.
//!
//! Discovery walks the catalog's year, type, model and sub-model selectors
//! depth first and writes one index row per diagram. Extraction loads the part
//! list of every indexed diagram and writes one record per part and identifier.

pub mod browser;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extraction;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;
pub mod metrics;
pub mod models;
pub mod page;
pub mod parts;
pub mod resume;
pub mod retry;
pub mod sink;
