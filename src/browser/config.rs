use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for launching browser sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Page navigation timeout in seconds (default: 30)
    pub navigation_timeout_secs: u64,

    /// Interval between element lookups while waiting, in milliseconds (default: 250)
    pub poll_interval_ms: u64,

    /// Browser window size
    pub window_width: u32,
    pub window_height: u32,

    /// Explicit Chrome/Chromium binary, otherwise auto-detected
    pub chrome_executable: Option<String>,

    /// Additional command-line flags passed to the browser
    pub extra_args: Vec<String>,

    /// User agent string to use
    pub user_agent: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout_secs: 30,
            poll_interval_ms: 250,
            window_width: 1920,
            window_height: 1080,
            chrome_executable: None,
            extra_args: Vec::new(),
            user_agent: Some(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
        }
    }
}

impl SessionConfig {
    /// Get the navigation timeout as a Duration
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Get the element poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = SessionConfig::default();
        assert!(config.headless);
        assert_eq!(config.navigation_timeout_secs, 30);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!((config.window_width, config.window_height), (1920, 1080));
        assert!(config.user_agent.is_some());
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_durations() {
        let config = SessionConfig::default();
        assert_eq!(config.navigation_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));

        let zero = SessionConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(zero.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_toml() {
        let config: SessionConfig = toml::from_str("headless = false").unwrap();
        assert!(!config.headless);
        assert_eq!(config.navigation_timeout_secs, 30);
    }
}
