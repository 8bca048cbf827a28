use crate::browser::BrowserConfig;
use crate::catalog::CatalogTimings;
use crate::discovery::YearRange;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    /// Prefix that turns a diagram locator into a page URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// `name` attribute of the brand logo on the landing page
    #[serde(default = "default_brand_key")]
    pub brand_key: String,

    /// Brand written into every row
    #[serde(default = "default_brand_label")]
    pub brand_label: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default)]
    pub year_min: Option<i32>,

    #[serde(default)]
    pub year_max: Option<i32>,

    /// Upper bound on "show more" clicks per render
    #[serde(default = "default_max_pagination_rounds")]
    pub max_pagination_rounds: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt, growing linearly
    #[serde(default = "default_delay")]
    pub delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Pause after every click while the catalog re-renders
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSettings {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Wait for elements that must appear
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Wait for the optional "show more" control
    #[serde(default = "default_show_more_timeout")]
    pub show_more_timeout_secs: u64,

    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_true")]
    pub disable_images: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_true() -> bool { true }
fn default_base_url() -> String { "https://epc.brp.com/#".to_string() }
fn default_brand_key() -> String { "LNX_EN_US".to_string() }
fn default_brand_label() -> String { "Lynx".to_string() }
fn default_max_pagination_rounds() -> usize { 50 }
fn default_max_attempts() -> u32 { 3 }
fn default_delay() -> u64 { 2000 }
fn default_max_delay() -> u64 { 6000 }
fn default_settle() -> u64 { 1000 }
fn default_window_width() -> u32 { 1920 }
fn default_window_height() -> u32 { 1080 }
fn default_wait_timeout() -> u64 { 20 }
fn default_show_more_timeout() -> u64 { 5 }
fn default_page_load_timeout() -> u64 { 30 }
fn default_poll_interval() -> u64 { 250 }
fn default_output_dir() -> String { "csv".to_string() }

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            brand_key: default_brand_key(),
            brand_label: default_brand_label(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            year_min: None,
            year_max: None,
            max_pagination_rounds: default_max_pagination_rounds(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay(),
            max_delay_ms: default_max_delay(),
            settle_ms: default_settle(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            wait_timeout_secs: default_wait_timeout(),
            show_more_timeout_secs: default_show_more_timeout(),
            page_load_timeout_secs: default_page_load_timeout(),
            poll_interval_ms: default_poll_interval(),
            disable_images: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Load configuration from `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("{} not found, using default configuration", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn catalog_timings(&self) -> CatalogTimings {
        CatalogTimings {
            wait: Duration::from_secs(self.browser.wait_timeout_secs),
            show_more_wait: Duration::from_secs(self.browser.show_more_timeout_secs),
            settle: Duration::from_millis(self.retry.settle_ms),
            poll: Duration::from_millis(self.browser.poll_interval_ms),
            max_pagination_rounds: self.crawl.max_pagination_rounds,
        }
    }

    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            headless: self.browser.headless,
            window_size: (self.browser.window_width, self.browser.window_height),
            timeout_seconds: self.browser.page_load_timeout_secs,
            disable_images: self.browser.disable_images,
            ..BrowserConfig::default()
        }
    }

    pub fn year_range(&self) -> YearRange {
        YearRange::new(self.crawl.year_min, self.crawl.year_max)
    }
}
