use async_trait::async_trait;
use tracing::{debug, warn};

use crate::app::Result;
use crate::browser::{BrowserSession, Locator, Lookup};
use crate::reveal::{RevealMechanism, RevealState, RevealStrategy};
use crate::reviews::ReviewConfig;

/// Drives the reveal controls of one review page through a browser session
pub struct PageRevealer<'a, S: BrowserSession> {
    session: &'a mut S,
    config: &'a ReviewConfig,
    state: RevealState,
    /// Clicks made earlier in the same movie session; the load-more delay keys on the running total
    prior_clicks: u32,
}

impl<'a, S: BrowserSession> PageRevealer<'a, S> {
    pub fn new(session: &'a mut S, config: &'a ReviewConfig, prior_clicks: u32) -> Self {
        Self {
            session,
            config,
            state: RevealState::default(),
            prior_clicks,
        }
    }

    pub fn state(&self) -> &RevealState {
        &self.state
    }

    pub fn into_state(mut self) -> RevealState {
        self.state.exhaust();
        self.state
    }

    async fn click_control(&mut self, locator: &Locator) -> bool {
        let control = match self
            .session
            .wait_for_clickable(locator, self.config.control_timeout())
            .await
        {
            Lookup::Found(control) => control,
            Lookup::NotFound => return false,
        };

        match self.session.click(&control).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Click on {} failed: {}", locator, e);
                false
            }
        }
    }

    /// Scroll until the document height stops changing; returns scrolls made
    async fn scroll_until_stable(&mut self) -> Result<u32> {
        let mut height = self.session.document_height().await?;

        for scroll in 1..=self.config.max_scrolls {
            self.session.scroll_to_bottom().await?;
            tokio::time::sleep(self.config.scroll_settle()).await;

            let next = self.session.document_height().await?;
            if next == height {
                return Ok(scroll);
            }
            height = next;
        }

        warn!(
            "Page still growing after {} scrolls, parsing what rendered",
            self.config.max_scrolls
        );
        Ok(self.config.max_scrolls)
    }
}

#[async_trait]
impl<S: BrowserSession> RevealStrategy for PageRevealer<'_, S> {
    async fn try_all(&mut self) -> Result<bool> {
        let config = self.config;
        self.state.switch_to(RevealMechanism::AllButton);
        if !self.click_control(&config.all_locator).await {
            return Ok(false);
        }
        self.state.record_click();
        tokio::time::sleep(config.click_settle()).await;

        let scrolls = self.scroll_until_stable().await?;
        debug!("\"All\" revealed the page after {} scrolls", scrolls);
        Ok(true)
    }

    async fn try_load_more(&mut self) -> Result<bool> {
        let config = self.config;
        self.state.switch_to(RevealMechanism::LoadMoreButton);
        if !self.click_control(&config.load_more_locator).await {
            return Ok(false);
        }
        self.state.record_click();

        let wait = config
            .delay
            .wait(config.load_more_base_secs, self.prior_clicks + self.state.clicks());
        tokio::time::sleep(wait).await;
        Ok(true)
    }

    async fn try_more(&mut self) -> Result<bool> {
        let config = self.config;
        self.state.switch_to(RevealMechanism::MoreButton);
        if !self.click_control(&config.more_locator).await {
            return Ok(false);
        }
        self.state.record_click();
        tokio::time::sleep(config.click_settle()).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ReplayPage, ReplaySession, SessionEvent};
    use crate::parser::LayoutVariant;
    use crate::reveal::reveal_all;
    use std::collections::HashMap;

    const URL: &str = "https://site.test/title/tt1/reviews";

    async fn session_with(page: ReplayPage) -> ReplaySession {
        let mut session = ReplaySession::new(HashMap::from([(URL.to_string(), page)]));
        session.navigate(URL).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_all_button_scrolls_until_height_settles() {
        let config = ReviewConfig::instant();
        let mut page = ReplayPage::new(r#"<span class="chained-see-more-button"><button>All</button></span>"#);
        let clicked = page.push_stage("<div>a</div>");
        let scrolled = page.push_stage("<div>a</div><div>b</div>");
        let page = page
            .on_click(0, config.all_locator.clone(), clicked)
            .on_scroll(clicked, scrolled);
        let mut session = session_with(page).await;

        let mut revealer = PageRevealer::new(&mut session, &config, 0);
        reveal_all(&mut revealer, config.max_load_more_clicks).await.unwrap();
        let state = revealer.into_state();

        assert_eq!(state.clicks(), 1);
        assert_eq!(state.layout(), LayoutVariant::FullPage);
        let scrolls = session
            .events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Scroll { .. }))
            .count();
        assert_eq!(scrolls, 2);
    }

    #[tokio::test]
    async fn test_load_more_until_gone_then_more() {
        let config = ReviewConfig::instant();
        let trigger = r#"<button id="load-more-trigger">Load More</button>"#;
        let mut page = ReplayPage::new(trigger);
        let second = page.push_stage(trigger);
        let third = page.push_stage("<p>done</p>");
        let page = page
            .on_click(0, config.load_more_locator.clone(), second)
            .on_click(second, config.load_more_locator.clone(), third);
        let mut session = session_with(page).await;

        let mut revealer = PageRevealer::new(&mut session, &config, 7);
        reveal_all(&mut revealer, config.max_load_more_clicks).await.unwrap();
        let state = revealer.into_state();

        assert_eq!(state.clicks(), 2);
        assert_eq!(state.layout(), LayoutVariant::Incremental);
    }

    #[tokio::test]
    async fn test_load_more_is_bounded() {
        let config = ReviewConfig::instant();
        let page = ReplayPage::new(r#"<button id="load-more-trigger">Load More</button>"#)
            .on_click(0, config.load_more_locator.clone(), 0);
        let mut session = session_with(page).await;

        let mut revealer = PageRevealer::new(&mut session, &config, 0);
        reveal_all(&mut revealer, 3).await.unwrap();
        assert_eq!(revealer.state().clicks(), 3);
    }

    #[tokio::test]
    async fn test_nothing_to_click() {
        let config = ReviewConfig::instant();
        let mut session = session_with(ReplayPage::new("<p>two reviews</p>")).await;

        let mut revealer = PageRevealer::new(&mut session, &config, 0);
        reveal_all(&mut revealer, config.max_load_more_clicks).await.unwrap();
        let state = revealer.into_state();

        assert_eq!(state.clicks(), 0);
        assert!(state.is_exhausted());
        assert_eq!(state.layout(), LayoutVariant::Incremental);
    }
}
