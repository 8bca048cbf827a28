//! Headless Chrome behind the [`Page`](crate::page::Page) contract.
//!
//! # Example
//!
//! ```no_run
//! use lynx_catalog_scraper::browser::{BrowserConfig, BrowserManager, BrowserScraper};
//! use lynx_catalog_scraper::page::{wait_for, Locator, Page};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = BrowserManager::new(BrowserConfig::default())?;
//! let page = BrowserScraper::new(manager.new_tab()?);
//!
//! page.navigate("https://epc.brp.com/")?;
//! let brands = Locator::css("div.brandLogoBox");
//! wait_for(&page, &brands, Duration::from_secs(20), Duration::from_millis(250))?;
//! println!("{} brands on the landing page", page.count(&brands)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod scraper;

pub use config::BrowserConfig;
pub use manager::{BrowserError, BrowserManager};
pub use scraper::BrowserScraper;
