//! Configuration management for cinecrawl.
//!
//! Tunables are read from `~/.config/cinecrawl/config.toml`. If the file
//! doesn't exist, a default configuration with comments is created.
//! Credentials and the database location come from the environment instead,
//! see [`Environment`].

pub mod environment;

pub use environment::Environment;

use crate::browser::SessionConfig;
use crate::discovery::DiscoveryConfig;
use crate::enrichment::EnrichmentConfig;
use crate::pipeline::PipelineConfig;
use crate::reviews::ReviewConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: SessionConfig,
    pub discovery: DiscoveryConfig,
    pub reviews: ReviewConfig,
    pub enrichment: EnrichmentConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load an explicit config file, which must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/cinecrawl/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("cinecrawl").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# cinecrawl configuration
#
# Credentials are not read from this file. Set them in the environment
# (or a .env file):
#   TMDB_API_KEY   metadata API key
#   DATABASE_URL   directory of the SQLite database (default: data dir)
#   DATABASE_NAME  database name, at most 38 characters
#
# Locators are CSS selectors, or XPath expressions prefixed with "xpath:".

[browser]
# Run Chrome without a visible window
headless = true

# Page navigation timeout in seconds
navigation_timeout_secs = 30

# Interval between element lookups while waiting (milliseconds)
poll_interval_ms = 250

[discovery]
site_url = "https://www.imdb.com"

# Titles per listing page and per "50 more" click
page_size = 50

# Click budget when the listing total cannot be read
max_reveal_actions = 400

# Re-check the title count this many times after each click, this far apart
growth_retries = 5
growth_poll_ms = 1000

# Adaptive wait after revealing: base + base * 1.2^(clicks / 10) seconds
settle_base_secs = 5.0

total_locator = "div.sc-13add9d7-3"
see_more_locator = "button.ipc-see-more__button"
title_locator = "li.ipc-metadata-list-summary-item h3.ipc-title__text"

[reviews]
site_url = "https://www.imdb.com"

# Waits (milliseconds)
count_timeout_ms = 5000
control_timeout_ms = 5000
click_settle_ms = 4000
scroll_settle_ms = 2000

# Bounds on reveal actions per rating bucket
max_scrolls = 500
max_load_more_clicks = 1000

# Adaptive waits (seconds), keyed on clicks made so far for the movie
load_more_base_secs = 1.0
settle_base_secs = 10.0

# Stop starting new rating buckets for a movie after this many seconds
# movie_deadline_secs = 1800

count_locator = '[data-testid="tturv-total-reviews"]'
count_fallback_locator = "div.header span"
all_locator = "span.chained-see-more-button button"
load_more_locator = "#load-more-trigger"
more_locator = "span.single-page-see-more-button button"

[enrichment]
api_base = "https://api.themoviedb.org/3"
language = "en-US"
timeout_secs = 10

[enrichment.retry]
# 429 waits rate_limit_base_secs * 2^attempt, 500/503 wait server_error_wait_secs
max_attempts = 3
rate_limit_base_secs = 1.0
server_error_wait_secs = 2.0

[pipeline]
# Movies per enrichment batch
batch_size = 10

# Concurrent review workers, each with its own browser
workers = 3

# `run` without dates crawls the last N days
recent_days = 7

# `popular` keeps the top N movies released since popular_since
popular_top_n = 10
popular_since = "2024-01-01"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory, set DATABASE_URL")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Environment variable {0} is not set")]
    MissingVariable(&'static str),

    #[error("Database name {name} is {len} characters, the limit is 38")]
    DatabaseNameTooLong { name: String, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Locator;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        let defaults = Config::default();
        assert_eq!(config.discovery.page_size, 50);
        assert_eq!(config.reviews.count_locator, defaults.reviews.count_locator);
        assert_eq!(config.reviews.movie_deadline_secs, None);
        assert_eq!(config.enrichment.retry.max_attempts, 3);
        assert_eq!(config.pipeline.workers, 3);
        assert_eq!(config.pipeline.popular_since, defaults.pipeline.popular_since);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[reviews]
load_more_locator = "xpath://button[@id='load-more-trigger']"
movie_deadline_secs = 600

[pipeline]
workers = 1
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(
            config.reviews.load_more_locator,
            Locator::xpath("//button[@id='load-more-trigger']")
        );
        assert_eq!(config.reviews.movie_deadline_secs, Some(600));
        assert_eq!(config.pipeline.workers, 1);
        assert_eq!(config.pipeline.batch_size, 10);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.discovery.growth_retries, 5);
        assert_eq!(config.reviews.settle_base_secs, 10.0);
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pipeline]\nworkers = \"many\"\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            Config::load_from(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
