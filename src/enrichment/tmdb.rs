use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::app::Result;
use crate::enrichment::retry::{with_retries, HttpReply};
use crate::enrichment::{Credits, EnrichmentConfig, MetadataClient};

/// Client for the TMDB v3 API
pub struct TmdbClient {
    client: Client,
    api_key: String,
    config: EnrichmentConfig,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, config: EnrichmentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("cinecrawl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            path
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", &self.api_key);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET a JSON document. Errors and logs name the path only, never the key.
    async fn get(&self, url: Url) -> Result<Value> {
        let path = url.path().to_string();
        debug!("GET {}", path);

        with_retries(&path, &self.config.retry, || send(self.client.get(url.clone()))).await
    }
}

async fn send(request: RequestBuilder) -> Result<HttpReply> {
    let response = request.send().await.map_err(reqwest::Error::without_url)?;
    let status = response.status();
    if !status.is_success() {
        return Ok(HttpReply::Status(status.as_u16()));
    }

    let body = response.json().await.map_err(reqwest::Error::without_url)?;
    Ok(HttpReply::Json(body))
}

/// TMDB id of the first movie in a `find` response
pub fn first_movie_result(found: &Value) -> Option<u64> {
    found
        .get("movie_results")?
        .as_array()?
        .first()?
        .get("id")?
        .as_u64()
}

/// Highest `popularity` first, at most `top_n`
pub fn top_by_popularity(mut movies: Vec<Value>, top_n: usize) -> Vec<Value> {
    let popularity = |m: &Value| m.get("popularity").and_then(Value::as_f64).unwrap_or(0.0);
    movies.sort_by(|a, b| popularity(b).total_cmp(&popularity(a)));
    movies.truncate(top_n);
    movies
}

fn array_field(mut value: Value, field: &str) -> Vec<Value> {
    match value.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

#[async_trait]
impl MetadataClient for TmdbClient {
    async fn genres(&self) -> Result<Vec<Value>> {
        let url = self.endpoint("genre/movie/list", &[("language", self.config.language.as_str())])?;
        Ok(array_field(self.get(url).await?, "genres"))
    }

    async fn find_tmdb_id(&self, imdb_id: &str) -> Result<Option<u64>> {
        let url = self.endpoint(
            &format!("find/{}", imdb_id),
            &[("external_source", "imdb_id")],
        )?;
        Ok(first_movie_result(&self.get(url).await?))
    }

    async fn movie_details(&self, tmdb_id: u64) -> Result<Value> {
        let url = self.endpoint(
            &format!("movie/{}", tmdb_id),
            &[("language", self.config.language.as_str())],
        )?;
        self.get(url).await
    }

    async fn credits(&self, tmdb_id: u64) -> Result<Credits> {
        let url = self.endpoint(&format!("movie/{}/credits", tmdb_id), &[])?;
        Ok(serde_json::from_value(self.get(url).await?)?)
    }

    async fn person(&self, person_id: u64) -> Result<Value> {
        let url = self.endpoint(
            &format!("person/{}", person_id),
            &[("language", self.config.language.as_str())],
        )?;
        self.get(url).await
    }

    async fn popular(&self, top_n: usize) -> Result<Vec<Value>> {
        let url = self.endpoint(
            "movie/popular",
            &[("language", self.config.language.as_str()), ("page", "1")],
        )?;
        let results = array_field(self.get(url).await?, "results");
        Ok(top_by_popularity(results, top_n))
    }
}
