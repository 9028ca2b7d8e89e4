//! Movie discovery from the date-filtered search listing.
//!
//! The listing renders `page_size` titles and a "50 more" control. Discovery
//! reads the reported total, clicks the control as many times as the target
//! needs (or until nothing more renders), and parses the final page once.

mod config;

pub use config::DiscoveryConfig;

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

use crate::app::Result;
use crate::browser::{BrowserSession, Lookup};
use crate::domain::Movie;
use crate::parser::{parse_movie_cards, parse_trailing_count};
use crate::reveal::{RevealMechanism, RevealState};

/// How many "50 more" clicks a listing visit is allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPlan {
    Clicks(u32),
    /// Total unknown: click until the control disappears or stops working
    UntilExhausted,
}

/// Clicks needed to render `min(limit, total)` titles when `page_size` are shown up front
pub fn plan_reveals(total: Option<u64>, limit: Option<u64>, page_size: u64) -> RevealPlan {
    let target = match (total, limit) {
        (Some(total), Some(limit)) => Some(total.min(limit)),
        (total, limit) => total.or(limit),
    };

    match target {
        Some(target) => {
            let page_size = page_size.max(1);
            let clicks = target.saturating_sub(page_size).div_ceil(page_size);
            RevealPlan::Clicks(u32::try_from(clicks).unwrap_or(u32::MAX))
        }
        None => RevealPlan::UntilExhausted,
    }
}

/// Dedup movies across batches by identifier, keeping the first occurrence.
/// Records without an identifier are never merged with each other.
pub fn merge_movies<I, B>(batches: I) -> Vec<Movie>
where
    I: IntoIterator<Item = B>,
    B: IntoIterator<Item = Movie>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for movie in batches.into_iter().flatten() {
        if !movie.has_identifier() || seen.insert(movie.id.clone()) {
            merged.push(movie);
        }
    }

    merged
}

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub movies: Vec<Movie>,
    /// Total the listing claimed, when readable
    pub reported_total: Option<u64>,
    pub plan: RevealPlan,
    /// Clicks actually performed
    pub reveals: u32,
    /// Cards parsed before dedup and truncation
    pub cards_seen: usize,
}

pub struct DiscoveryEngine {
    config: DiscoveryConfig,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Feature films released between `from` and `to`, inclusive
    pub fn listing_url(&self, from: NaiveDate, to: NaiveDate) -> Result<String> {
        let mut url = Url::parse(&self.config.site_url)?.join("search/title/")?;
        url.set_query(Some(&format!(
            "title_type=feature&release_date={},{}",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        )));
        Ok(url.into())
    }

    /// Discover up to `limit` movies released in `[from, to]`.
    ///
    /// Navigation or markup failures are errors; a missing total or control
    /// only shortens the reveal loop.
    pub async fn discover<S: BrowserSession>(
        &self,
        session: &mut S,
        from: NaiveDate,
        to: NaiveDate,
        limit: Option<usize>,
    ) -> Result<DiscoveryReport> {
        let span = info_span!("discover", %from, %to);
        self.discover_inner(session, from, to, limit)
            .instrument(span)
            .await
    }

    async fn discover_inner<S: BrowserSession>(
        &self,
        session: &mut S,
        from: NaiveDate,
        to: NaiveDate,
        limit: Option<usize>,
    ) -> Result<DiscoveryReport> {
        let url = self.listing_url(from, to)?;
        info!("Opening listing {}", url);
        session.navigate(&url).await?;

        let reported_total = self.read_total(session).await;
        let plan = plan_reveals(
            reported_total,
            limit.map(|l| l as u64),
            self.config.page_size,
        );
        match reported_total {
            Some(total) => info!("Listing reports {} titles, plan {:?}", total, plan),
            None => warn!("Listing total unreadable, revealing until exhausted"),
        }

        let budget = match plan {
            RevealPlan::Clicks(n) => n,
            RevealPlan::UntilExhausted => self.config.max_reveal_actions,
        };

        let mut state = RevealState::starting_with(RevealMechanism::LoadMoreButton);
        state.observe(session.element_count(&self.config.title_locator).await);

        while state.clicks() < budget {
            if !self.reveal_once(session, &mut state).await {
                state.exhaust();
                break;
            }
        }

        let settle = self
            .config
            .delay
            .wait(self.config.settle_base_secs, state.clicks());
        if !settle.is_zero() {
            debug!("Waiting {:?} after {} reveals", settle, state.clicks());
            tokio::time::sleep(settle).await;
        }

        let markup = session.current_markup().await?;
        let cards = parse_movie_cards(&markup);
        let cards_seen = cards.len();

        let mut movies = merge_movies([cards.iter().map(Movie::from_card)]);
        if let Some(limit) = limit {
            movies.truncate(limit);
        }

        let missing = movies.iter().filter(|m| !m.has_identifier()).count();
        if missing > 0 {
            warn!("{} listed titles have no identifier", missing);
        }
        info!(
            "Discovered {} movies from {} cards after {} reveals",
            movies.len(),
            cards_seen,
            state.clicks()
        );

        Ok(DiscoveryReport {
            movies,
            reported_total,
            plan,
            reveals: state.clicks(),
            cards_seen,
        })
    }

    async fn read_total<S: BrowserSession>(&self, session: &mut S) -> Option<u64> {
        let handle = session
            .wait_for_element(&self.config.total_locator, self.config.count_timeout())
            .await
            .found()?;
        let text = session.text_of(&handle).await?;
        parse_trailing_count(&text)
    }

    /// Click "50 more" once. False once the control is gone or the click did
    /// not render any new titles.
    async fn reveal_once<S: BrowserSession>(&self, session: &mut S, state: &mut RevealState) -> bool {
        let control = match session
            .wait_for_clickable(&self.config.see_more_locator, self.config.control_timeout())
            .await
        {
            Lookup::Found(control) => control,
            Lookup::NotFound => {
                debug!("No reveal control after {} clicks", state.clicks());
                return false;
            }
        };

        if let Err(e) = session.click(&control).await {
            warn!("Reveal click failed: {}", e);
            return false;
        }
        state.record_click();

        for _ in 0..self.config.growth_retries.max(1) {
            let visible = session.element_count(&self.config.title_locator).await;
            if state.observe(visible) {
                debug!("Reveal {} shows {} titles", state.clicks(), visible);
                return true;
            }
            tokio::time::sleep(self.config.growth_poll()).await;
        }

        warn!(
            "Title count stuck at {} after reveal {}",
            state.prior_visible(),
            state.clicks()
        );
        false
    }
}
