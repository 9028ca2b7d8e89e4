use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::browser::Locator;
use crate::reveal::DelayPolicy;

/// Configuration for the per-movie review collector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Site root the review URLs are built on
    pub site_url: String,

    /// How long to wait for a bucket's review count, in milliseconds (default: 5000)
    pub count_timeout_ms: u64,

    /// How long to wait for each reveal control, in milliseconds (default: 5000)
    pub control_timeout_ms: u64,

    /// Pause after clicking "All" or "More", in milliseconds (default: 4000)
    pub click_settle_ms: u64,

    /// Pause after each scroll before re-measuring the page, in milliseconds (default: 2000)
    pub scroll_settle_ms: u64,

    /// Upper bound on scrolls after "All" (default: 500)
    pub max_scrolls: u32,

    /// Upper bound on "Load More" clicks per bucket (default: 1000)
    pub max_load_more_clicks: u32,

    /// Base of the adaptive wait after each "Load More" click, in seconds (default: 1)
    pub load_more_base_secs: f64,

    /// Base of the adaptive wait once a bucket is fully revealed, in seconds (default: 10)
    pub settle_base_secs: f64,

    /// Stop starting new buckets for a movie after this many seconds
    pub movie_deadline_secs: Option<u64>,

    pub delay: DelayPolicy,

    /// Bucket review count, e.g. "1,234 Reviews"
    pub count_locator: Locator,
    /// Older pages put the count in the header instead
    pub count_fallback_locator: Locator,
    pub all_locator: Locator,
    pub load_more_locator: Locator,
    pub more_locator: Locator,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            site_url: "https://www.imdb.com".to_string(),
            count_timeout_ms: 5000,
            control_timeout_ms: 5000,
            click_settle_ms: 4000,
            scroll_settle_ms: 2000,
            max_scrolls: 500,
            max_load_more_clicks: 1000,
            load_more_base_secs: 1.0,
            settle_base_secs: 10.0,
            movie_deadline_secs: None,
            delay: DelayPolicy::default(),
            count_locator: Locator::css(r#"[data-testid="tturv-total-reviews"]"#),
            count_fallback_locator: Locator::css("div.header span"),
            all_locator: Locator::css("span.chained-see-more-button button"),
            load_more_locator: Locator::css("#load-more-trigger"),
            more_locator: Locator::css("span.single-page-see-more-button button"),
        }
    }
}

impl ReviewConfig {
    /// Same locators and limits, no waiting. For replayed pages.
    pub fn instant() -> Self {
        Self {
            count_timeout_ms: 0,
            control_timeout_ms: 0,
            click_settle_ms: 0,
            scroll_settle_ms: 0,
            load_more_base_secs: 0.0,
            settle_base_secs: 0.0,
            ..Self::default()
        }
    }

    pub fn count_timeout(&self) -> Duration {
        Duration::from_millis(self.count_timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn movie_deadline(&self) -> Option<Duration> {
        self.movie_deadline_secs.map(Duration::from_secs)
    }
}
