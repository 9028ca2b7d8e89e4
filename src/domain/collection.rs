use serde::{Deserialize, Serialize};

use crate::domain::Review;

/// All reviews gathered for one movie, plus how many the site claimed to have
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieReviewCollection {
    #[serde(rename = "Movie ID")]
    pub movie_id: String,
    /// Sum of the page-reported counts over every rating bucket visited
    #[serde(rename = "Total Reviews", default)]
    pub expected_total: u64,
    /// Reviews parsed from the pages, duplicates included
    #[serde(skip)]
    pub parsed_total: u64,
    /// Reviews dropped because an earlier bucket already produced them
    #[serde(skip)]
    pub duplicates_dropped: u64,
    /// Rating buckets whose page could not be read
    #[serde(skip)]
    pub failed_buckets: Vec<u8>,
    #[serde(rename = "Reviews", default)]
    pub reviews: Vec<Review>,
}

impl MovieReviewCollection {
    pub fn new(movie_id: impl Into<String>) -> Self {
        Self {
            movie_id: movie_id.into(),
            ..Default::default()
        }
    }

    /// Ratio of parsed reviews to reported reviews, 1.0 when nothing was reported
    pub fn completeness(&self) -> f64 {
        if self.expected_total == 0 {
            1.0
        } else {
            self.parsed_total as f64 / self.expected_total as f64
        }
    }

    /// Fewer reviews than reported, or a bucket that was never read
    pub fn is_incomplete(&self) -> bool {
        self.parsed_total < self.expected_total || !self.failed_buckets.is_empty()
    }

    /// Buckets failed and nothing was collected, so the result carries no data
    pub fn is_failed(&self) -> bool {
        !self.failed_buckets.is_empty() && self.reviews.is_empty()
    }

    pub fn missing(&self) -> u64 {
        self.expected_total.saturating_sub(self.parsed_total)
    }

    /// Most recent parseable review date, formatted `YYYY-MM-DD`
    pub fn last_review_date(&self) -> Option<String> {
        self.reviews
            .iter()
            .filter_map(Review::parsed_date)
            .max()
            .map(|d| d.format("%Y-%m-%d").to_string())
    }
}
