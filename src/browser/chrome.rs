use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::app::{CrawlerError, Result};
use crate::browser::config::SessionConfig;
use crate::browser::{BrowserSession, Locator, Lookup, SessionFactory};

const CLICKABLE_CHECK: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    return !this.disabled && r.width > 0 && r.height > 0; \
}";

const CENTER_AND_CLICK: &str = "function() { \
    this.scrollIntoView({block: 'center'}); \
    this.click(); \
}";

/// Time one lookup may take before `deadline`. Never below `poll`, so a
/// zero timeout still gets a single attempt.
fn poll_budget(deadline: Instant, now: Instant, poll: Duration) -> Duration {
    deadline.saturating_duration_since(now).max(poll)
}

/// Chrome-backed session using chromiumoxide
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    config: SessionConfig,
}

impl ChromeSession {
    /// Launch a browser and open a blank page
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--disable-blink-features=AutomationControlled")
            .window_size(config.window_width, config.window_height);

        for arg in &config.extra_args {
            builder = builder.arg(arg.as_str());
        }

        if let Some(ref path) = config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| CrawlerError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            CrawlerError::Browser(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        // The CDP connection only makes progress while its event stream is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlerError::Browser(format!("Failed to create page: {}", e)))?;

        if let Some(ref ua) = config.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| CrawlerError::Browser(format!("Failed to set user agent: {}", e)))?;
        }

        Ok(Self {
            browser,
            page,
            handler,
            config,
        })
    }

    async fn find(&self, locator: &Locator, budget: Duration) -> Option<Element> {
        let lookup = async {
            match locator {
                Locator::Css(css) => self.page.find_element(css.as_str()).await,
                Locator::XPath(xpath) => self.page.find_xpath(xpath.as_str()).await,
            }
        };

        match tokio::time::timeout(budget, lookup).await {
            Ok(Ok(element)) => Some(element),
            _ => None,
        }
    }

    async fn is_clickable(element: &Element, budget: Duration) -> bool {
        match tokio::time::timeout(budget, element.call_js_fn(CLICKABLE_CHECK, false)).await {
            Ok(Ok(ret)) => ret
                .result
                .value
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn wait(
        &self,
        locator: &Locator,
        timeout: Duration,
        require_clickable: bool,
    ) -> Lookup<Element> {
        let deadline = Instant::now() + timeout;
        let poll = self.config.poll_interval();

        loop {
            let budget = poll_budget(deadline, Instant::now(), poll);
            if let Some(element) = self.find(locator, budget).await {
                let budget = poll_budget(deadline, Instant::now(), poll);
                if !require_clickable || Self::is_clickable(&element, budget).await {
                    return Lookup::Found(element);
                }
            }

            if Instant::now() >= deadline {
                tracing::debug!("Element not found within {:?}: {}", timeout, locator);
                return Lookup::NotFound;
            }

            tokio::time::sleep(poll).await;
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    type Handle = Element;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        match tokio::time::timeout(self.config.navigation_timeout(), self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(CrawlerError::Browser(format!("Navigation failed: {}", e))),
            Err(_) => Err(CrawlerError::Browser(format!(
                "Navigation to {} timed out after {:?}",
                url,
                self.config.navigation_timeout()
            ))),
        }
    }

    async fn wait_for_element(&mut self, locator: &Locator, timeout: Duration) -> Lookup<Element> {
        self.wait(locator, timeout, false).await
    }

    async fn wait_for_clickable(&mut self, locator: &Locator, timeout: Duration) -> Lookup<Element> {
        self.wait(locator, timeout, true).await
    }

    async fn click(&mut self, handle: &Element) -> Result<()> {
        handle
            .scroll_into_view()
            .await
            .map_err(|e| CrawlerError::Browser(format!("Failed to scroll element into view: {}", e)))?;

        handle
            .call_js_fn(CENTER_AND_CLICK, false)
            .await
            .map_err(|e| CrawlerError::Browser(format!("Click failed: {}", e)))?;

        Ok(())
    }

    async fn text_of(&mut self, handle: &Element) -> Option<String> {
        handle.inner_text().await.ok().flatten()
    }

    async fn current_markup(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| CrawlerError::Browser(format!("Failed to read page content: {}", e)))
    }

    async fn element_count(&mut self, locator: &Locator) -> usize {
        let found = match locator {
            Locator::Css(css) => self.page.find_elements(css.as_str()).await,
            Locator::XPath(xpath) => self.page.find_xpaths(xpath.as_str()).await,
        };
        found.map(|elements| elements.len()).unwrap_or(0)
    }

    async fn document_height(&mut self) -> Result<u64> {
        let height: f64 = self
            .page
            .evaluate("document.body.scrollHeight")
            .await
            .map_err(|e| CrawlerError::Browser(format!("Script execution failed: {}", e)))?
            .into_value()
            .map_err(|e| CrawlerError::Browser(format!("Failed to parse result: {:?}", e)))?;

        Ok(height.max(0.0) as u64)
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(|e| CrawlerError::Browser(format!("Script execution failed: {}", e)))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

/// Launches a fresh Chrome instance per worker
#[derive(Debug, Clone)]
pub struct ChromeSessionFactory {
    config: SessionConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    async fn open(&self) -> Result<ChromeSession> {
        ChromeSession::launch(self.config.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_budget_tracks_deadline() {
        let now = Instant::now();
        let poll = Duration::from_millis(250);

        let budget = poll_budget(now + Duration::from_secs(2), now, poll);
        assert_eq!(budget, Duration::from_secs(2));

        // Past or at the deadline: one poll interval, never the navigation timeout
        assert_eq!(poll_budget(now, now, poll), poll);
        assert_eq!(poll_budget(now, now + Duration::from_secs(5), poll), poll);
    }
}
