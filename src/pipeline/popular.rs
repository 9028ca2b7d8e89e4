use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

use super::Pipeline;
use crate::app::Result;
use crate::browser::SessionFactory;
use crate::domain::{Movie, MovieReviewCollection, Review};
use crate::enrichment::{document_id, MetadataClient};
use crate::store::collections::{MOVIE_REVIEWS, TOP_POPULAR_MOVIES};
use crate::store::DocumentStore;

/// Document stored in `top_popular_movies`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopularMovie {
    pub imdb_id: String,
    pub total_reviews: u64,
    pub last_date_review: Option<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopularSummary {
    pub movies: usize,
    pub refreshed: usize,
    pub reviews_added: usize,
    pub removed: usize,
    /// Movies whose collection failed, left as stored
    pub failed: usize,
    pub persistence_failures: usize,
}

/// Append the fresh reviews whose dedup key is not already present.
/// Returns the merged list and how many reviews were added.
pub fn merge_reviews(existing: Vec<Review>, fresh: Vec<Review>) -> (Vec<Review>, usize) {
    let mut seen: HashSet<String> = existing.iter().map(Review::dedup_key).collect();
    let mut merged = existing;
    let before = merged.len();

    for review in fresh {
        if seen.insert(review.dedup_key()) {
            merged.push(review);
        }
    }

    let added = merged.len() - before;
    (merged, added)
}

impl From<MovieReviewCollection> for PopularMovie {
    fn from(collection: MovieReviewCollection) -> Self {
        Self {
            last_date_review: collection.last_review_date(),
            total_reviews: collection.reviews.len() as u64,
            imdb_id: collection.movie_id,
            reviews: collection.reviews,
        }
    }
}

/// Top movies by catalog popularity, mapped back to their IMDb ids
pub async fn popular_from_catalog<M: MetadataClient + ?Sized>(
    metadata: &M,
    top_n: usize,
) -> Result<Vec<Movie>> {
    let mut movies = Vec::new();

    for entry in metadata.popular(top_n).await? {
        let Some(tmdb_id) = document_id(&entry) else {
            continue;
        };
        let details = metadata.movie_details(tmdb_id).await?;
        let Some(imdb_id) = details.get("imdb_id").and_then(Value::as_str) else {
            warn!("Popular movie {} has no IMDb id, skipping", tmdb_id);
            continue;
        };
        let title = details
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default();
        movies.push(Movie::new(imdb_id, title));
    }

    Ok(movies)
}

impl<M, D, F> Pipeline<M, D, F>
where
    M: MetadataClient,
    D: DocumentStore + Send + Sync,
    F: SessionFactory + 'static,
{
    /// Refresh `top_popular_movies` from the given ranking.
    ///
    /// Only the first `popular_top_n` movies with an identifier are kept.
    /// New reviews are merged into both the popular entry and the movie's
    /// `movie_reviews` document; entries that dropped out of the ranking
    /// are deleted.
    pub async fn refresh_popular(&self, movies: Vec<Movie>) -> PopularSummary {
        let ids: Vec<String> = movies
            .into_iter()
            .filter(Movie::has_identifier)
            .map(|m| m.id)
            .take(self.config.popular_top_n)
            .collect();

        let span = info_span!("popular", movies = ids.len());
        self.refresh_popular_ids(ids).instrument(span).await
    }

    async fn refresh_popular_ids(&self, ids: Vec<String>) -> PopularSummary {
        let mut summary = PopularSummary {
            movies: ids.len(),
            ..Default::default()
        };

        for collection in self.pool.collect_all(ids.clone()).await {
            if collection.is_failed() {
                warn!("Keeping stored entry of {}: no bucket could be read", collection.movie_id);
                summary.failed += 1;
                continue;
            }
            let added = self.merge_popular(&collection, &mut summary.persistence_failures);
            self.merge_movie_reviews(collection, &mut summary.persistence_failures);
            summary.reviews_added += added;
            summary.refreshed += 1;
        }

        if self.is_running() {
            summary.removed = self.remove_stale_popular(&ids);
        }

        info!(
            "Popular refresh: {} movies refreshed, {} new reviews, {} removed",
            summary.refreshed, summary.reviews_added, summary.removed
        );
        summary
    }

    fn merge_popular(&self, collection: &MovieReviewCollection, failures: &mut usize) -> usize {
        let existing = self
            .store
            .get(TOP_POPULAR_MOVIES, &collection.movie_id)
            .ok()
            .flatten()
            .and_then(|doc| serde_json::from_value::<PopularMovie>(doc).ok())
            .map(|p| p.reviews)
            .unwrap_or_default();

        let (reviews, added) = merge_reviews(existing, collection.reviews.clone());
        let entry = PopularMovie::from(MovieReviewCollection {
            reviews,
            ..MovieReviewCollection::new(collection.movie_id.clone())
        });

        match serde_json::to_value(&entry) {
            Ok(doc) => {
                self.save(TOP_POPULAR_MOVIES, &entry.imdb_id, &doc, failures);
            }
            Err(e) => {
                warn!("Could not encode popular entry {}: {}", entry.imdb_id, e);
                *failures += 1;
            }
        }
        added
    }

    fn merge_movie_reviews(&self, collection: MovieReviewCollection, failures: &mut usize) {
        let collection = self.merged_with_stored(collection);

        match serde_json::to_value(&collection) {
            Ok(doc) => {
                self.save(MOVIE_REVIEWS, &collection.movie_id, &doc, failures);
            }
            Err(e) => {
                warn!("Could not encode reviews of {}: {}", collection.movie_id, e);
                *failures += 1;
            }
        }
    }

    fn remove_stale_popular(&self, current: &[String]) -> usize {
        let stored = match self.store.list(TOP_POPULAR_MOVIES) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not list {}: {}", TOP_POPULAR_MOVIES, e);
                return 0;
            }
        };

        let mut removed = 0;
        for (key, _) in stored {
            if current.contains(&key) {
                continue;
            }
            match self.store.delete(TOP_POPULAR_MOVIES, &key) {
                Ok(true) => {
                    info!("{} left the popular ranking", key);
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Could not remove {} from {}: {}", key, TOP_POPULAR_MOVIES, e),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ReplayPage;
    use crate::pipeline::testing::{pipeline_with, FakeCatalog};
    use crate::pipeline::PipelineConfig;
    use crate::reviews::{ReviewCollector, ReviewConfig};
    use serde_json::json;
    use std::collections::HashMap;

    fn review(author: &str, date: &str) -> Review {
        Review {
            author: author.into(),
            date: date.into(),
            ..Default::default()
        }
    }

    fn review_markup(reviews: &[(&str, &str)]) -> String {
        let mut markup = format!(
            r#"<div data-testid="tturv-total-reviews">{} Reviews</div>"#,
            reviews.len()
        );
        for (author, date) in reviews {
            markup.push_str(&format!(
                r#"<div class="lister-item mode-detail imdb-user-review">
                     <span class="display-name-link"><a>{}</a></span>
                     <span class="review-date">{}</span>
                   </div>"#,
                author, date
            ));
        }
        markup
    }

    #[test]
    fn test_merge_reviews_skips_known() {
        let existing = vec![review("ana", "1 May 2024"), review("bo", "2 May 2024")];
        let fresh = vec![review("bo", "2 May 2024"), review("cy", "3 May 2024")];

        let (merged, added) = merge_reviews(existing, fresh);
        assert_eq!(added, 1);
        let authors: Vec<_> = merged.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(authors, vec!["ana", "bo", "cy"]);
    }

    #[test]
    fn test_popular_entry_from_collection() {
        let mut collection = MovieReviewCollection::new("tt1");
        collection.reviews = vec![review("a", "7 October 2024"), review("b", "No date"), review("c", "Sep 1, 2024")];

        let entry = PopularMovie::from(collection);
        assert_eq!(entry.imdb_id, "tt1");
        assert_eq!(entry.total_reviews, 3);
        assert_eq!(entry.last_date_review.as_deref(), Some("2024-10-07"));
        assert_eq!(PopularMovie::from(MovieReviewCollection::new("tt2")).last_date_review, None);
    }

    #[tokio::test]
    async fn test_refresh_merges_and_removes_stale() {
        let collector = ReviewCollector::new(ReviewConfig::instant());
        let mut pages = HashMap::new();
        pages.insert(
            collector.review_url("tt1", 9).unwrap(),
            ReplayPage::new(review_markup(&[("ana", "1 May 2024"), ("cy", "3 June 2024")])),
        );
        pages.insert(
            collector.review_url("tt2", 6).unwrap(),
            ReplayPage::new(review_markup(&[("dee", "4 July 2024")])),
        );
        let pipeline = pipeline_with(
            FakeCatalog::default(),
            pages,
            PipelineConfig {
                popular_top_n: 2,
                ..Default::default()
            },
        );

        let store = pipeline.store();
        let known = PopularMovie {
            imdb_id: "tt1".into(),
            total_reviews: 1,
            last_date_review: Some("2024-05-01".into()),
            reviews: vec![review("ana", "1 May 2024")],
        };
        store
            .upsert(TOP_POPULAR_MOVIES, "tt1", &serde_json::to_value(&known).unwrap())
            .unwrap();
        store
            .upsert(TOP_POPULAR_MOVIES, "tt_old", &json!({ "imdb_id": "tt_old" }))
            .unwrap();

        let summary = pipeline
            .refresh_popular(vec![
                Movie::new("tt1", "One"),
                Movie::new("N/A", "Unlinked"),
                Movie::new("tt2", "Two"),
                Movie::new("tt3", "Three"),
            ])
            .await;

        assert_eq!(summary.movies, 2);
        assert_eq!(summary.refreshed, 2);
        assert_eq!(summary.reviews_added, 2);
        assert_eq!(summary.removed, 1);
        assert!(store.get(TOP_POPULAR_MOVIES, "tt_old").unwrap().is_none());

        let tt1: PopularMovie =
            serde_json::from_value(store.get(TOP_POPULAR_MOVIES, "tt1").unwrap().unwrap()).unwrap();
        assert_eq!(tt1.total_reviews, 2);
        assert_eq!(tt1.last_date_review.as_deref(), Some("2024-06-03"));

        let reviews = store.get(MOVIE_REVIEWS, "tt2").unwrap().unwrap();
        assert_eq!(reviews["Reviews"][0]["Author"], "dee");
    }

    #[tokio::test]
    async fn test_popular_from_catalog_maps_ids() {
        let catalog = FakeCatalog::with(&[("tt10", 10), ("tt20", 20), ("tt30", 30)]);
        let movies = popular_from_catalog(&catalog, 2).await.unwrap();

        let ids: Vec<_> = movies.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tt10", "tt20"]);
        assert_eq!(movies[0].title, "Movie 10");
    }
}
