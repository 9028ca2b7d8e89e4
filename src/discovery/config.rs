use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::browser::Locator;
use crate::reveal::DelayPolicy;

/// Configuration for the listing-page discovery engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Site root the listing URL is built on
    pub site_url: String,

    /// Titles rendered per listing page and per "50 more" click (default: 50)
    pub page_size: u64,

    /// Upper bound on clicks when the listing total cannot be read (default: 400)
    pub max_reveal_actions: u32,

    /// How long to wait for the total-count element, in milliseconds (default: 5000)
    pub count_timeout_ms: u64,

    /// How long to wait for the "50 more" control, in milliseconds (default: 10000)
    pub control_timeout_ms: u64,

    /// Title-count re-checks after each click before giving up (default: 5)
    pub growth_retries: u32,

    /// Pause between title-count re-checks, in milliseconds (default: 1000)
    pub growth_poll_ms: u64,

    /// Base of the adaptive wait after the reveal loop, in seconds (default: 5)
    pub settle_base_secs: f64,

    pub delay: DelayPolicy,

    /// Element whose text reads like "1-50 of 3,456"
    pub total_locator: Locator,
    /// The "50 more" control
    pub see_more_locator: Locator,
    /// One match per rendered title
    pub title_locator: Locator,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            site_url: "https://www.imdb.com".to_string(),
            page_size: 50,
            max_reveal_actions: 400,
            count_timeout_ms: 5000,
            control_timeout_ms: 10_000,
            growth_retries: 5,
            growth_poll_ms: 1000,
            settle_base_secs: 5.0,
            delay: DelayPolicy::default(),
            total_locator: Locator::css("div.sc-13add9d7-3"),
            see_more_locator: Locator::css("button.ipc-see-more__button"),
            title_locator: Locator::css("li.ipc-metadata-list-summary-item h3.ipc-title__text"),
        }
    }
}

impl DiscoveryConfig {
    /// Same locators and limits, no waiting. For replayed pages.
    pub fn instant() -> Self {
        Self {
            count_timeout_ms: 0,
            control_timeout_ms: 0,
            growth_poll_ms: 0,
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

    pub fn growth_poll(&self) -> Duration {
        Duration::from_millis(self.growth_poll_ms)
    }
}
