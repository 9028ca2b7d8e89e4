//! Movie metadata from TMDB.
//!
//! Documents are passed through as JSON values; only the fields the pipeline
//! keys on (ids, crew jobs) are read.

mod retry;
mod tmdb;

pub use retry::RetryPolicy;
pub use tmdb::TmdbClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::Result;

/// Configuration for the metadata API. The key itself comes from `TMDB_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub api_base: String,
    pub language: String,
    /// Per-request timeout in seconds (default: 10)
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.themoviedb.org/3".to_string(),
            language: "en-US".to_string(),
            timeout_secs: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// Cast and crew of one movie
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<Value>,
    #[serde(default)]
    pub crew: Vec<Value>,
}

impl Credits {
    pub fn directors(&self) -> impl Iterator<Item = &Value> {
        self.crew
            .iter()
            .filter(|member| member.get("job").and_then(Value::as_str) == Some("Director"))
    }
}

/// TMDB id of a person, credit or movie document
pub fn document_id(document: &Value) -> Option<u64> {
    document.get("id").and_then(Value::as_u64)
}

#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn genres(&self) -> Result<Vec<Value>>;

    /// TMDB id for an IMDb id, `None` when TMDB does not know the movie
    async fn find_tmdb_id(&self, imdb_id: &str) -> Result<Option<u64>>;

    async fn movie_details(&self, tmdb_id: u64) -> Result<Value>;

    async fn credits(&self, tmdb_id: u64) -> Result<Credits>;

    async fn person(&self, person_id: u64) -> Result<Value>;

    /// Currently popular movies, most popular first
    async fn popular(&self, top_n: usize) -> Result<Vec<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credits_directors() {
        let credits: Credits = serde_json::from_value(json!({
            "id": 693134,
            "cast": [{ "id": 1190668, "name": "Timothée Chalamet", "known_for_department": "Acting" }],
            "crew": [
                { "id": 137427, "job": "Director", "name": "Denis Villeneuve" },
                { "id": 1, "job": "Producer" },
                { "id": 2 }
            ]
        }))
        .unwrap();

        assert_eq!(credits.cast.len(), 1);
        let directors: Vec<_> = credits.directors().filter_map(document_id).collect();
        assert_eq!(directors, vec![137427]);
    }

    #[test]
    fn test_missing_credit_lists_default_empty() {
        let credits: Credits = serde_json::from_value(json!({ "id": 1 })).unwrap();
        assert_eq!(credits, Credits::default());
    }
}
