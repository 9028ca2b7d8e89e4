use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limit exceeded after {attempts} attempts: {url}")]
    RateLimitExceeded { url: String, attempts: u32 },

    #[error("Failed to fetch {url} after {attempts} attempts")]
    ExhaustedRetries {
        url: String,
        attempts: u32,
        #[source]
        last: Box<CrawlerError>,
    },

    #[error("HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Server error {status} from {url}")]
    TransientServerError { url: String, status: u16 },

    #[error("Movie card has no resolvable identifier: {0}")]
    MissingIdentifier(String),

    #[error("Failed to persist {key} into {collection}: {reason}")]
    PersistenceConflict {
        collection: String,
        key: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl CrawlerError {
    /// Whether the error came from the enrichment API's retry budget
    pub fn is_retry_exhaustion(&self) -> bool {
        matches!(
            self,
            CrawlerError::RateLimitExceeded { .. } | CrawlerError::ExhaustedRetries { .. }
        )
    }
}

impl From<crate::config::ConfigError> for CrawlerError {
    fn from(err: crate::config::ConfigError) -> Self {
        CrawlerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
