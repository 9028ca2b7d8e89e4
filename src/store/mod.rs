pub mod sqlite;

use serde_json::Value;

use crate::app::Result;

pub use sqlite::SqliteStore;

/// Collection names the pipeline writes to
pub mod collections {
    pub const MOVIE_GENRES: &str = "movie_genres";
    pub const MOVIE_DETAILS: &str = "movie_details";
    pub const MOVIE_REVIEWS: &str = "movie_reviews";
    pub const MOVIE_ACTOR_CREDITS: &str = "movie_actor_credits";
    pub const ACTOR_DETAILS: &str = "actor_details";
    pub const MOVIE_DIRECTOR_CREDITS: &str = "movie_director_credits";
    pub const DIRECTOR_DETAILS: &str = "director_details";
    pub const TOP_POPULAR_MOVIES: &str = "top_popular_movies";
}

/// Keyed JSON documents grouped into named collections
pub trait DocumentStore {
    /// Insert or replace the document stored under `key`
    fn upsert(&self, collection: &str, key: &str, document: &Value) -> Result<()>;
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>>;
    /// Every document in the collection, ordered by key
    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>>;
    fn count(&self, collection: &str) -> Result<usize>;
    /// True if a document was removed
    fn delete(&self, collection: &str, key: &str) -> Result<bool>;
}
