use super::config::BrowserConfig;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsString;
use std::sync::Arc;

/// Owns the Chrome process and hands out tabs
pub struct BrowserManager {
    browser: Arc<Browser>,
    config: BrowserConfig,
}

impl BrowserManager {
    pub fn new(config: BrowserConfig) -> Result<Self, BrowserError> {
        let args: Vec<OsString> = config.launch_args().into_iter().map(OsString::from).collect();
        let launch_options = Self::build_launch_options(&config, &args)?;

        log::info!(
            "Launching Chrome (headless: {}, window: {}x{})",
            config.headless,
            config.window_size.0,
            config.window_size.1
        );
        let browser = Browser::new(launch_options)
            .map_err(|e| BrowserError::Initialization(e.to_string()))?;

        Ok(Self {
            browser: Arc::new(browser),
            config,
        })
    }

    fn build_launch_options<'a>(
        config: &BrowserConfig,
        args: &'a [OsString],
    ) -> Result<LaunchOptions<'a>, BrowserError> {
        LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.window_size))
            .idle_browser_timeout(config.idle_timeout())
            .args(args.iter().map(|a| a.as_os_str()).collect())
            .build()
            .map_err(|e| BrowserError::Configuration(e.to_string()))
    }

    /// Open a tab with the configured page load timeout
    pub fn new_tab(&self) -> Result<Arc<Tab>, BrowserError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| BrowserError::TabCreation(e.to_string()))?;
        tab.set_default_timeout(self.config.timeout());
        Ok(tab)
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser initialization failed: {0}")]
    Initialization(String),

    #[error("Browser configuration error: {0}")]
    Configuration(String),

    #[error("Tab creation failed: {0}")]
    TabCreation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_options_carry_args() {
        let config = BrowserConfig::default();
        let args: Vec<OsString> = config.launch_args().into_iter().map(OsString::from).collect();
        let options = BrowserManager::build_launch_options(&config, &args).unwrap();

        assert!(options
            .args
            .iter()
            .any(|arg| arg.to_string_lossy().contains("imagesEnabled=false")));
        assert_eq!(options.window_size, Some((1920, 1080)));
    }

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn test_browser_manager_creation() {
        let manager = BrowserManager::new(BrowserConfig::default()).unwrap();
        assert!(manager.new_tab().is_ok());
    }
}
