//! Enrichment and persistence of discovered movies.
//!
//! Movies are processed in fixed-size batches. Within a batch every movie is
//! first enriched one by one through the metadata API, then all of the
//! batch's review collections run on the worker pool. A failure for one
//! movie or one record is logged and never aborts the batch.

mod popular;
mod workers;

pub use popular::{merge_reviews, popular_from_catalog, PopularMovie, PopularSummary};
pub use workers::{ReviewWorkerPool, DEFAULT_WORKERS};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, info_span, warn, Instrument};

use crate::app::{CrawlerError, Result};
use crate::browser::SessionFactory;
use crate::domain::{Movie, MovieReviewCollection};
use crate::enrichment::{document_id, MetadataClient};
use crate::reviews::ReviewCollector;
use crate::store::collections::{
    ACTOR_DETAILS, DIRECTOR_DETAILS, MOVIE_ACTOR_CREDITS, MOVIE_DETAILS, MOVIE_DIRECTOR_CREDITS,
    MOVIE_GENRES, MOVIE_REVIEWS,
};
use crate::store::DocumentStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Movies per batch (default: 10)
    pub batch_size: usize,
    /// Concurrent review workers (default: 3)
    pub workers: usize,
    /// Days covered by `run` when no dates are given (default: 7)
    pub recent_days: u32,
    /// Movies kept by the popular refresh (default: 10)
    pub popular_top_n: usize,
    /// Earliest release date considered by the popular refresh
    pub popular_since: NaiveDate,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            workers: DEFAULT_WORKERS,
            recent_days: 7,
            popular_top_n: 10,
            popular_since: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub movies: usize,
    pub batches: usize,
    pub missing_identifier: usize,
    pub not_in_catalog: usize,
    pub enriched: usize,
    pub enrichment_failures: usize,
    pub collections_saved: usize,
    pub incomplete_collections: usize,
    /// Collections with failed buckets and no reviews, never stored
    pub failed_collections: usize,
    pub reviews_saved: usize,
    pub persistence_failures: usize,
}

pub struct Pipeline<M, D, F>
where
    M: MetadataClient,
    D: DocumentStore,
    F: SessionFactory,
{
    metadata: Arc<M>,
    store: Arc<D>,
    pool: ReviewWorkerPool<F>,
    config: PipelineConfig,
    running: Arc<AtomicBool>,
}

impl<M, D, F> Pipeline<M, D, F>
where
    M: MetadataClient,
    D: DocumentStore + Send + Sync,
    F: SessionFactory + 'static,
{
    pub fn new(
        metadata: Arc<M>,
        store: Arc<D>,
        sessions: Arc<F>,
        collector: Arc<ReviewCollector>,
        config: PipelineConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        let pool = ReviewWorkerPool::new(sessions, collector, config.workers, running.clone());
        Self {
            metadata,
            store,
            pool,
            config,
            running,
        }
    }

    pub fn store(&self) -> &Arc<D> {
        &self.store
    }

    pub fn pool(&self) -> &ReviewWorkerPool<F> {
        &self.pool
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Store the genre list once; returns how many genres were written
    pub async fn ensure_genres(&self) -> Result<usize> {
        if self.store.count(MOVIE_GENRES)? > 0 {
            info!("Collection {} already populated, skipping genres", MOVIE_GENRES);
            return Ok(0);
        }

        let genres = self.metadata.genres().await?;
        let mut saved = 0;
        for genre in &genres {
            let Some(id) = document_id(genre) else {
                warn!("Genre without id: {}", genre);
                continue;
            };
            self.store.upsert(MOVIE_GENRES, &id.to_string(), genre)?;
            saved += 1;
        }

        info!("Stored {} genres", saved);
        Ok(saved)
    }

    /// Enrich and collect reviews for every movie, batch by batch
    pub async fn run(&self, movies: Vec<Movie>) -> PipelineSummary {
        let span = info_span!("run", movies = movies.len());
        self.run_batches(movies).instrument(span).await
    }

    async fn run_batches(&self, movies: Vec<Movie>) -> PipelineSummary {
        let mut summary = PipelineSummary {
            movies: movies.len(),
            ..Default::default()
        };

        if let Err(e) = self.ensure_genres().await {
            warn!("Could not store genres: {}", e);
        }

        let batch_size = self.config.batch_size.max(1);
        let total_batches = movies.len().div_ceil(batch_size);

        for (index, batch) in movies.chunks(batch_size).enumerate() {
            if !self.is_running() {
                warn!(
                    "Shutdown requested, {} of {} batches left unprocessed",
                    total_batches - index,
                    total_batches
                );
                break;
            }

            self.process_batch(batch, &mut summary)
                .instrument(info_span!("batch", index = index + 1, size = batch.len()))
                .await;
            summary.batches += 1;
        }

        info!(
            "Run finished: {} movies, {} enriched, {} review collections saved, {} collections failed, {} failures",
            summary.movies,
            summary.enriched,
            summary.collections_saved,
            summary.failed_collections,
            summary.enrichment_failures + summary.persistence_failures
        );
        summary
    }

    async fn process_batch(&self, batch: &[Movie], summary: &mut PipelineSummary) {
        info!("Processing batch of {} movies", batch.len());
        let mut to_collect = Vec::with_capacity(batch.len());

        for movie in batch {
            if !self.is_running() {
                break;
            }
            if !movie.has_identifier() {
                warn!("{}", CrawlerError::MissingIdentifier(movie.title.clone()));
                summary.missing_identifier += 1;
                continue;
            }

            let result = self
                .enrich_movie(&movie.id, summary)
                .instrument(info_span!("movie", id = %movie.id))
                .await;

            match result {
                Ok(Some(_)) => {
                    summary.enriched += 1;
                    to_collect.push(movie.id.clone());
                }
                Ok(None) => {
                    info!("{} is not in the metadata catalog, skipping", movie.id);
                    summary.not_in_catalog += 1;
                }
                Err(e) => {
                    if e.is_retry_exhaustion() {
                        warn!("Enrichment of {} gave up: {}", movie.id, e);
                    } else {
                        error!("Enrichment of {} failed: {}", movie.id, e);
                    }
                    summary.enrichment_failures += 1;
                    to_collect.push(movie.id.clone());
                }
            }
        }

        for collection in self.pool.collect_all(to_collect).await {
            self.save_collection(collection, summary);
        }
    }

    /// Resolve the catalog id and store details and credits.
    /// `Ok(None)` when the catalog has no such movie.
    async fn enrich_movie(&self, imdb_id: &str, summary: &mut PipelineSummary) -> Result<Option<u64>> {
        let Some(tmdb_id) = self.metadata.find_tmdb_id(imdb_id).await? else {
            return Ok(None);
        };

        let details = self.metadata.movie_details(tmdb_id).await?;
        self.save(
            MOVIE_DETAILS,
            &tmdb_id.to_string(),
            &details,
            &mut summary.persistence_failures,
        );

        let credits = self.metadata.credits(tmdb_id).await?;
        for actor in &credits.cast {
            self.save_credit(MOVIE_ACTOR_CREDITS, ACTOR_DETAILS, tmdb_id, actor, summary)
                .await?;
        }
        for director in credits.directors() {
            self.save_credit(MOVIE_DIRECTOR_CREDITS, DIRECTOR_DETAILS, tmdb_id, director, summary)
                .await?;
        }

        info!(
            "Enriched {} as {} ({} cast)",
            imdb_id,
            tmdb_id,
            credits.cast.len()
        );
        Ok(Some(tmdb_id))
    }

    /// Store one credit tagged with its movie, plus the person it credits
    /// unless that person is already stored.
    async fn save_credit(
        &self,
        credit_collection: &str,
        person_collection: &str,
        tmdb_id: u64,
        credit: &Value,
        summary: &mut PipelineSummary,
    ) -> Result<()> {
        let Some(person_id) = document_id(credit) else {
            warn!("Credit without person id in {}", credit_collection);
            return Ok(());
        };

        let mut credit = credit.clone();
        if let Some(fields) = credit.as_object_mut() {
            fields.insert("movie_tmdb_id".to_string(), json!(tmdb_id));
        }
        let key = credit
            .get("credit_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:{}", tmdb_id, person_id));
        self.save(credit_collection, &key, &credit, &mut summary.persistence_failures);

        let person_key = person_id.to_string();
        if matches!(self.store.get(person_collection, &person_key), Ok(Some(_))) {
            return Ok(());
        }
        let person = self.metadata.person(person_id).await?;
        self.save(
            person_collection,
            &person_key,
            &person,
            &mut summary.persistence_failures,
        );
        Ok(())
    }

    /// Store a movie's reviews. A failed collection is dropped, and a partial
    /// one is merged into the stored document instead of replacing it.
    fn save_collection(&self, collection: MovieReviewCollection, summary: &mut PipelineSummary) {
        if collection.is_failed() {
            warn!(
                "Not storing reviews of {}: buckets {:?} failed",
                collection.movie_id, collection.failed_buckets
            );
            summary.failed_collections += 1;
            return;
        }
        if collection.is_incomplete() {
            summary.incomplete_collections += 1;
        }

        let collection = if collection.failed_buckets.is_empty() {
            collection
        } else {
            self.merged_with_stored(collection)
        };

        match serde_json::to_value(&collection) {
            Ok(document) => {
                if self.save(
                    MOVIE_REVIEWS,
                    &collection.movie_id,
                    &document,
                    &mut summary.persistence_failures,
                ) {
                    summary.collections_saved += 1;
                    summary.reviews_saved += collection.reviews.len();
                }
            }
            Err(e) => {
                error!("Could not encode reviews of {}: {}", collection.movie_id, e);
                summary.persistence_failures += 1;
            }
        }
    }

    /// Fold the stored reviews of the same movie into `collection`
    fn merged_with_stored(&self, mut collection: MovieReviewCollection) -> MovieReviewCollection {
        let stored = self
            .store
            .get(MOVIE_REVIEWS, &collection.movie_id)
            .ok()
            .flatten()
            .and_then(|doc| serde_json::from_value::<MovieReviewCollection>(doc).ok());

        if let Some(stored) = stored {
            let (reviews, _) = merge_reviews(stored.reviews, collection.reviews);
            collection.reviews = reviews;
            collection.expected_total = collection.expected_total.max(stored.expected_total);
        }
        collection
    }

    /// Upsert one document; a failure is logged and counted, never raised
    fn save(&self, collection: &str, key: &str, document: &Value, failures: &mut usize) -> bool {
        match self.store.upsert(collection, key, document) {
            Ok(()) => true,
            Err(e) => {
                let conflict = CrawlerError::PersistenceConflict {
                    collection: collection.to_string(),
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                error!("{}", conflict);
                *failures += 1;
                false
            }
        }
    }

    /// Close the worker sessions
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{Pipeline, PipelineConfig};
    use crate::app::{CrawlerError, Result};
    use crate::browser::{ReplayPage, ReplaySessionFactory};
    use crate::enrichment::{Credits, MetadataClient};
    use crate::reviews::{ReviewCollector, ReviewConfig};
    use crate::store::SqliteStore;

    pub type TestPipeline = Pipeline<FakeCatalog, SqliteStore, ReplaySessionFactory>;

    /// Pipeline over an in-memory store whose sessions replay `pages`
    pub fn pipeline_with(
        catalog: FakeCatalog,
        pages: HashMap<String, ReplayPage>,
        config: PipelineConfig,
    ) -> TestPipeline {
        Pipeline::new(
            Arc::new(catalog),
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(ReplaySessionFactory::new(pages)),
            Arc::new(ReviewCollector::new(ReviewConfig::instant())),
            config,
            Arc::new(AtomicBool::new(true)),
        )
    }

    /// In-memory catalog keyed by IMDb id
    #[derive(Default)]
    pub struct FakeCatalog {
        pub ids: HashMap<String, u64>,
        /// Catalog ids whose details always hit the rate limit
        pub rate_limited: Vec<u64>,
        pub person_calls: AtomicUsize,
    }

    impl FakeCatalog {
        pub fn with(ids: &[(&str, u64)]) -> Self {
            Self {
                ids: ids.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MetadataClient for FakeCatalog {
        async fn genres(&self) -> Result<Vec<Value>> {
            Ok(vec![
                json!({ "id": 28, "name": "Action" }),
                json!({ "id": 18, "name": "Drama" }),
            ])
        }

        async fn find_tmdb_id(&self, imdb_id: &str) -> Result<Option<u64>> {
            Ok(self.ids.get(imdb_id).copied())
        }

        async fn movie_details(&self, tmdb_id: u64) -> Result<Value> {
            if self.rate_limited.contains(&tmdb_id) {
                return Err(CrawlerError::RateLimitExceeded {
                    url: format!("/3/movie/{}", tmdb_id),
                    attempts: 3,
                });
            }
            let imdb_id = self
                .ids
                .iter()
                .find(|(_, id)| **id == tmdb_id)
                .map(|(imdb, _)| imdb.clone());
            Ok(json!({ "id": tmdb_id, "imdb_id": imdb_id, "title": format!("Movie {}", tmdb_id) }))
        }

        async fn credits(&self, tmdb_id: u64) -> Result<Credits> {
            Ok(Credits {
                cast: vec![
                    json!({ "id": 1, "credit_id": format!("c-{}-1", tmdb_id), "known_for_department": "Acting" }),
                    json!({ "id": 2, "credit_id": format!("c-{}-2", tmdb_id), "known_for_department": "Acting" }),
                ],
                crew: vec![
                    json!({ "id": 9, "credit_id": format!("d-{}", tmdb_id), "job": "Director" }),
                    json!({ "id": 10, "credit_id": format!("p-{}", tmdb_id), "job": "Producer" }),
                ],
            })
        }

        async fn person(&self, person_id: u64) -> Result<Value> {
            self.person_calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "id": person_id, "name": format!("Person {}", person_id) }))
        }

        async fn popular(&self, top_n: usize) -> Result<Vec<Value>> {
            let mut ids: Vec<_> = self.ids.values().copied().collect();
            ids.sort_unstable();
            Ok(ids
                .into_iter()
                .take(top_n)
                .map(|id| json!({ "id": id, "popularity": 1.0 }))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{pipeline_with, FakeCatalog, TestPipeline};
    use super::*;
    use crate::browser::{ReplayPage, ReplaySessionFactory};
    use crate::domain::{Review, MISSING_IDENTIFIER};
    use crate::reviews::ReviewConfig;
    use crate::store::SqliteStore;
    use std::collections::HashMap;

    fn review_pages(ids: &[&str]) -> HashMap<String, ReplayPage> {
        let collector = ReviewCollector::new(ReviewConfig::instant());
        ids.iter()
            .map(|id| {
                let markup = format!(
                    r#"<div data-testid="tturv-total-reviews">2 Reviews</div>
                       <div class="lister-item mode-detail imdb-user-review"><a class="title">One</a><span class="display-name-link"><a>a-{id}</a></span></div>
                       <div class="lister-item mode-detail imdb-user-review"><a class="title">Two</a><span class="display-name-link"><a>b-{id}</a></span></div>"#,
                    id = id
                );
                (collector.review_url(id, 8).unwrap(), ReplayPage::new(markup))
            })
            .collect()
    }

    fn pipeline(catalog: FakeCatalog, review_ids: &[&str], config: PipelineConfig) -> TestPipeline {
        pipeline_with(catalog, review_pages(review_ids), config)
    }

    #[tokio::test]
    async fn test_run_stores_every_collection() {
        let catalog = FakeCatalog::with(&[("tt1", 101), ("tt2", 102), ("tt3", 103)]);
        let pipeline = pipeline(
            catalog,
            &["tt1", "tt2", "tt3"],
            PipelineConfig {
                batch_size: 2,
                ..Default::default()
            },
        );
        let movies = vec![
            Movie::new("tt1", "One"),
            Movie::new("tt2", "Two"),
            Movie::new(MISSING_IDENTIFIER, "Unlinked"),
            Movie::new("tt3", "Three"),
        ];

        let summary = pipeline.run(movies).await;
        pipeline.shutdown().await;

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.missing_identifier, 1);
        assert_eq!(summary.enriched, 3);
        assert_eq!(summary.collections_saved, 3);
        assert_eq!(summary.reviews_saved, 6);
        assert_eq!(summary.persistence_failures, 0);

        let store = pipeline.store();
        assert_eq!(store.count(MOVIE_GENRES).unwrap(), 2);
        assert_eq!(store.count(MOVIE_DETAILS).unwrap(), 3);
        assert_eq!(store.count(MOVIE_ACTOR_CREDITS).unwrap(), 6);
        assert_eq!(store.count(MOVIE_DIRECTOR_CREDITS).unwrap(), 3);
        assert_eq!(store.count(ACTOR_DETAILS).unwrap(), 2);
        assert_eq!(store.count(DIRECTOR_DETAILS).unwrap(), 1);

        let credit = store.get(MOVIE_ACTOR_CREDITS, "c-102-1").unwrap().unwrap();
        assert_eq!(credit["movie_tmdb_id"], 102);

        let reviews = store.get(MOVIE_REVIEWS, "tt2").unwrap().unwrap();
        assert_eq!(reviews["Movie ID"], "tt2");
        assert_eq!(reviews["Reviews"].as_array().unwrap().len(), 2);
        assert_eq!(reviews["Reviews"][0]["Author"], "a-tt2");
    }

    #[tokio::test]
    async fn test_people_are_fetched_once() {
        let catalog = FakeCatalog::with(&[("tt1", 101), ("tt2", 102)]);
        let pipeline = pipeline(catalog, &[], PipelineConfig::default());

        pipeline
            .run(vec![Movie::new("tt1", "One"), Movie::new("tt2", "Two")])
            .await;

        // Two actors and one director shared by both movies
        assert_eq!(pipeline.metadata.person_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_movie_is_skipped() {
        let catalog = FakeCatalog::with(&[("tt1", 101)]);
        let pipeline = pipeline(catalog, &["tt1", "tt9"], PipelineConfig::default());

        let summary = pipeline
            .run(vec![Movie::new("tt9", "Nowhere"), Movie::new("tt1", "One")])
            .await;

        assert_eq!(summary.not_in_catalog, 1);
        assert_eq!(summary.collections_saved, 1);
        assert!(pipeline.store().get(MOVIE_REVIEWS, "tt9").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_movie_still_gets_reviews() {
        let mut catalog = FakeCatalog::with(&[("tt1", 101), ("tt2", 102)]);
        catalog.rate_limited = vec![102];
        let pipeline = pipeline(catalog, &["tt1", "tt2"], PipelineConfig::default());

        let summary = pipeline
            .run(vec![Movie::new("tt1", "One"), Movie::new("tt2", "Two")])
            .await;

        assert_eq!(summary.enrichment_failures, 1);
        assert_eq!(summary.collections_saved, 2);
        let store = pipeline.store();
        assert!(store.get(MOVIE_DETAILS, "102").unwrap().is_none());
        assert!(store.get(MOVIE_REVIEWS, "tt2").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_genres_stored_only_once() {
        let pipeline = pipeline(FakeCatalog::default(), &[], PipelineConfig::default());
        assert_eq!(pipeline.ensure_genres().await.unwrap(), 2);
        assert_eq!(pipeline.ensure_genres().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_collection_keeps_stored_reviews() {
        let factory = ReplaySessionFactory::new(HashMap::new()).unreachable();
        let pipeline = Pipeline::new(
            Arc::new(FakeCatalog::with(&[("tt1", 101), ("tt2", 102)])),
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(factory.clone()),
            Arc::new(ReviewCollector::new(ReviewConfig::instant())),
            PipelineConfig {
                workers: 1,
                ..Default::default()
            },
            Arc::new(AtomicBool::new(true)),
        );
        let mut known = MovieReviewCollection::new("tt1");
        known.expected_total = 2;
        known.reviews = vec![
            Review {
                author: "ana".into(),
                ..Default::default()
            },
            Review {
                author: "bo".into(),
                ..Default::default()
            },
        ];
        pipeline
            .store()
            .upsert(MOVIE_REVIEWS, "tt1", &serde_json::to_value(&known).unwrap())
            .unwrap();

        let summary = pipeline
            .run(vec![Movie::new("tt1", "One"), Movie::new("tt2", "Two")])
            .await;
        pipeline.shutdown().await;

        assert_eq!(summary.collections_saved, 0);
        assert_eq!(summary.failed_collections, 2);
        assert_eq!(summary.incomplete_collections, 0);
        assert_eq!(factory.opened(), 2);

        let store = pipeline.store();
        let stored: MovieReviewCollection =
            serde_json::from_value(store.get(MOVIE_REVIEWS, "tt1").unwrap().unwrap()).unwrap();
        assert_eq!(stored.reviews.len(), 2);
        assert!(store.get(MOVIE_REVIEWS, "tt2").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_collection_merges_into_stored() {
        let pipeline = pipeline(FakeCatalog::default(), &[], PipelineConfig::default());
        let mut known = MovieReviewCollection::new("tt1");
        known.reviews = vec![Review {
            author: "ana".into(),
            ..Default::default()
        }];
        pipeline
            .store()
            .upsert(MOVIE_REVIEWS, "tt1", &serde_json::to_value(&known).unwrap())
            .unwrap();

        let mut partial = MovieReviewCollection::new("tt1");
        partial.failed_buckets = vec![3];
        partial.reviews = vec![Review {
            author: "cy".into(),
            ..Default::default()
        }];
        partial.parsed_total = 1;
        partial.expected_total = 1;

        let mut summary = PipelineSummary::default();
        pipeline.save_collection(partial, &mut summary);

        assert_eq!(summary.collections_saved, 1);
        assert_eq!(summary.incomplete_collections, 1);
        let stored = pipeline.store().get(MOVIE_REVIEWS, "tt1").unwrap().unwrap();
        assert_eq!(stored["Reviews"].as_array().unwrap().len(), 2);
        assert_eq!(stored["Reviews"][1]["Author"], "cy");
    }

    #[tokio::test]
    async fn test_stopped_run_processes_nothing() {
        let pipeline = pipeline(FakeCatalog::with(&[("tt1", 101)]), &["tt1"], PipelineConfig::default());
        pipeline.running.store(false, Ordering::SeqCst);

        let summary = pipeline.run(vec![Movie::new("tt1", "One")]).await;
        assert_eq!(summary.batches, 0);
        assert_eq!(summary.collections_saved, 0);
    }
}
