use std::time::Duration;

/// Configuration for the Chrome instance that drives the catalog
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,

    /// Browser window size; the catalog lays out its levels for desktop widths
    pub window_size: (u32, u32),

    pub user_agent: Option<String>,

    /// Page load timeout in seconds
    pub timeout_seconds: u64,

    /// Disable image loading for performance
    pub disable_images: bool,

    /// Additional Chrome flags
    pub chrome_flags: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            timeout_seconds: 30,
            disable_images: true,
            chrome_flags: vec!["--disable-dev-shm-usage".to_string()],
        }
    }
}

impl BrowserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Browser idle time after which Chrome shuts itself down.
    ///
    /// Leaves pause between interactions for the retry backoff, so this is kept
    /// well above the page load timeout.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1) * 10)
    }

    /// Extra command-line arguments passed to Chrome
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.disable_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }
        if let Some(user_agent) = &self.user_agent {
            args.push(format!("--user-agent={}", user_agent));
        }
        args.extend(self.chrome_flags.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_size, (1920, 1080));
        assert!(config.user_agent.is_some());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_launch_args() {
        let config = BrowserConfig::default();
        let args = config.launch_args();
        assert!(args.iter().any(|a| a == "--blink-settings=imagesEnabled=false"));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=")));

        let config = BrowserConfig {
            disable_images: false,
            user_agent: None,
            chrome_flags: vec![],
            ..BrowserConfig::default()
        };
        assert!(config.launch_args().is_empty());
    }
}
