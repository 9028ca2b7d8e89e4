//! Per-movie review collection.
//!
//! Reviews are listed per rating bucket (1 through 10). For every bucket the
//! collector reads the reported count, reveals the whole list with whichever
//! control the page offers, parses the rendered cards and folds them into a
//! [`CollectionSession`]. A bucket that fails is logged and skipped; the movie
//! still gets everything the other buckets produced.

mod config;
mod revealer;
mod session;

pub use config::ReviewConfig;
pub use revealer::PageRevealer;
pub use session::{BucketOutcome, CollectionSession};

use std::ops::RangeInclusive;

use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

use crate::app::Result;
use crate::browser::{BrowserSession, Lookup};
use crate::domain::{MovieReviewCollection, Review};
use crate::parser::{parse_leading_count, parse_review_cards, LayoutVariant};
use crate::reveal::reveal_all;

pub const RATING_BUCKETS: RangeInclusive<u8> = 1..=10;

/// Parse review cards in the expected layout, switching to the other layout
/// when the expected one finds nothing.
pub fn parse_reviews(markup: &str, expected: LayoutVariant) -> (LayoutVariant, Vec<Review>) {
    let reviews = parse_review_cards(markup, expected);
    if !reviews.is_empty() {
        return (expected, reviews);
    }

    let other = expected.other();
    let fallback = parse_review_cards(markup, other);
    if fallback.is_empty() {
        (expected, reviews)
    } else {
        debug!("No {:?} cards, parsed {} as {:?}", expected, fallback.len(), other);
        (other, fallback)
    }
}

pub struct ReviewCollector {
    config: ReviewConfig,
}

impl ReviewCollector {
    pub fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Reviews of one rating bucket, newest first
    pub fn review_url(&self, movie_id: &str, bucket: u8) -> Result<String> {
        let mut url = Url::parse(&self.config.site_url)?.join(&format!("title/{}/reviews", movie_id))?;
        url.set_query(Some(&format!(
            "sort=submissionDate&dir=desc&ratingFilter={}",
            bucket
        )));
        Ok(url.into())
    }

    /// Collect every review of `movie_id` across all rating buckets
    pub async fn collect<S: BrowserSession>(&self, session: &mut S, movie_id: &str) -> MovieReviewCollection {
        self.collect_session(session, movie_id).await.finish()
    }

    /// Like [`collect`](Self::collect), keeping the session bookkeeping
    pub async fn collect_session<S: BrowserSession>(
        &self,
        session: &mut S,
        movie_id: &str,
    ) -> CollectionSession {
        let span = info_span!("movie", id = %movie_id);
        self.collect_buckets(session, movie_id)
            .instrument(span)
            .await
    }

    async fn collect_buckets<S: BrowserSession>(
        &self,
        session: &mut S,
        movie_id: &str,
    ) -> CollectionSession {
        let deadline = self.config.movie_deadline().map(|d| Instant::now() + d);
        let mut state = CollectionSession::new(movie_id, deadline);

        for bucket in RATING_BUCKETS {
            if state.deadline_passed() {
                warn!(
                    "Deadline reached before bucket {}, keeping {} reviews",
                    bucket,
                    state.collection().reviews.len()
                );
                break;
            }

            let prior_clicks = state.clicks();
            let result = self
                .collect_bucket(session, movie_id, bucket, prior_clicks)
                .instrument(info_span!("bucket", bucket))
                .await;

            state = match result {
                Ok(outcome) => {
                    if outcome.is_incomplete() {
                        warn!(
                            "Bucket {} incomplete: {} of {} reviews",
                            bucket,
                            outcome.reviews.len(),
                            outcome.expected
                        );
                    }
                    state.merge(outcome)
                }
                Err(e) => {
                    warn!("Bucket {} failed, skipping: {}", bucket, e);
                    state.record_failure(bucket)
                }
            };
        }

        if !state.failed_buckets().is_empty() {
            warn!(
                "{} of {} buckets failed: {:?}",
                state.failed_buckets().len(),
                RATING_BUCKETS.len(),
                state.failed_buckets()
            );
        }

        let collection = state.collection();
        if collection.is_incomplete() {
            warn!(
                "Collected {} of {} reviews ({:.1}%), {} missing",
                collection.parsed_total,
                collection.expected_total,
                collection.completeness() * 100.0,
                collection.missing()
            );
        } else {
            info!(
                "Collected {} reviews ({} duplicates dropped)",
                collection.reviews.len(),
                collection.duplicates_dropped
            );
        }

        state
    }

    async fn collect_bucket<S: BrowserSession>(
        &self,
        session: &mut S,
        movie_id: &str,
        bucket: u8,
        prior_clicks: u32,
    ) -> Result<BucketOutcome> {
        let url = self.review_url(movie_id, bucket)?;
        session.navigate(&url).await?;

        let expected = self.read_bucket_total(session).await;
        if expected == 0 {
            debug!("No reviews reported");
            return Ok(BucketOutcome::empty(bucket));
        }
        debug!("{} reviews reported", expected);

        let mut revealer = PageRevealer::new(session, &self.config, prior_clicks);
        reveal_all(&mut revealer, self.config.max_load_more_clicks).await?;
        let reveal = revealer.into_state();
        debug!(
            "Reveal stopped at {:?} after {} clicks, {} reviews visible",
            reveal.mechanism(),
            reveal.clicks(),
            reveal.prior_visible()
        );

        let settle = self
            .config
            .delay
            .wait(self.config.settle_base_secs, prior_clicks + reveal.clicks());
        tokio::time::sleep(settle).await;

        let markup = session.current_markup().await?;
        let (layout, reviews) = parse_reviews(&markup, reveal.layout());

        Ok(BucketOutcome {
            bucket,
            expected,
            reviews,
            clicks: reveal.clicks(),
            layout: Some(layout),
        })
    }

    /// Reported count for the current bucket; 0 when no readable count exists
    async fn read_bucket_total<S: BrowserSession>(&self, session: &mut S) -> u64 {
        for locator in [&self.config.count_locator, &self.config.count_fallback_locator] {
            if let Lookup::Found(handle) = session
                .wait_for_element(locator, self.config.count_timeout())
                .await
            {
                let count = session
                    .text_of(&handle)
                    .await
                    .as_deref()
                    .and_then(parse_leading_count);
                if let Some(count) = count {
                    return count;
                }
            }
        }
        0
    }
}
