use std::collections::HashSet;

use tokio::time::Instant;

use crate::domain::{MovieReviewCollection, Review};
use crate::parser::LayoutVariant;

/// What one rating bucket produced
#[derive(Debug, Clone, PartialEq)]
pub struct BucketOutcome {
    pub bucket: u8,
    /// Count the page reported for this bucket
    pub expected: u64,
    pub reviews: Vec<Review>,
    /// Reveal clicks spent on this bucket
    pub clicks: u32,
    /// Layout the reviews were parsed with, `None` when the bucket was skipped
    pub layout: Option<LayoutVariant>,
}

impl BucketOutcome {
    /// A bucket whose count was zero or unreadable
    pub fn empty(bucket: u8) -> Self {
        Self {
            bucket,
            expected: 0,
            reviews: Vec::new(),
            clicks: 0,
            layout: None,
        }
    }

    pub fn is_incomplete(&self) -> bool {
        (self.reviews.len() as u64) < self.expected
    }
}

/// Running state of one movie's collection, threaded through its bucket passes
#[derive(Debug)]
pub struct CollectionSession {
    collection: MovieReviewCollection,
    seen: HashSet<String>,
    clicks: u32,
    failed_buckets: Vec<u8>,
    deadline: Option<Instant>,
}

impl CollectionSession {
    pub fn new(movie_id: impl Into<String>, deadline: Option<Instant>) -> Self {
        Self {
            collection: MovieReviewCollection::new(movie_id),
            seen: HashSet::new(),
            clicks: 0,
            failed_buckets: Vec::new(),
            deadline,
        }
    }

    pub fn movie_id(&self) -> &str {
        &self.collection.movie_id
    }

    /// Reveal clicks made so far across every bucket
    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    pub fn failed_buckets(&self) -> &[u8] {
        &self.failed_buckets
    }

    pub fn collection(&self) -> &MovieReviewCollection {
        &self.collection
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fold a bucket into the collection, dropping reviews already seen in
    /// earlier buckets. Identical cards within the bucket itself are all kept.
    pub fn merge(mut self, outcome: BucketOutcome) -> Self {
        self.collection.expected_total += outcome.expected;
        self.collection.parsed_total += outcome.reviews.len() as u64;
        self.clicks += outcome.clicks;

        let mut bucket_keys = HashSet::new();
        for review in outcome.reviews {
            let key = review.dedup_key();
            if self.seen.contains(&key) {
                self.collection.duplicates_dropped += 1;
                continue;
            }
            bucket_keys.insert(key);
            self.collection.reviews.push(review);
        }
        self.seen.extend(bucket_keys);

        self
    }

    pub fn record_failure(mut self, bucket: u8) -> Self {
        self.failed_buckets.push(bucket);
        self
    }

    pub fn finish(mut self) -> MovieReviewCollection {
        self.collection.failed_buckets = self.failed_buckets;
        self.collection
    }
}
