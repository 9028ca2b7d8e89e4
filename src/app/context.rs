use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::info;

use crate::app::error::{CrawlerError, Result};
use crate::browser::ChromeSessionFactory;
use crate::config::{Config, Environment};
use crate::discovery::DiscoveryEngine;
use crate::enrichment::{MetadataClient, TmdbClient};
use crate::pipeline::{Pipeline, ReviewWorkerPool};
use crate::reviews::ReviewCollector;
use crate::store::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub environment: Environment,
    pub store: Arc<SqliteStore>,
    pub sessions: Arc<ChromeSessionFactory>,
    pub discovery: DiscoveryEngine,
    pub collector: Arc<ReviewCollector>,
    /// Cleared on SIGINT/SIGTERM; checked before each batch and movie
    pub running: Arc<AtomicBool>,
}

impl AppContext {
    /// Open the database named by the environment, creating its directory
    pub fn new(config: Config, environment: Environment) -> Result<Self> {
        let db_path = environment.database_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Using database {}", db_path.display());

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Ok(Self::with_store(config, environment, store))
    }

    pub fn in_memory(config: Config, environment: Environment) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Ok(Self::with_store(config, environment, store))
    }

    fn with_store(config: Config, environment: Environment, store: Arc<SqliteStore>) -> Self {
        let sessions = Arc::new(ChromeSessionFactory::new(config.browser.clone()));
        let discovery = DiscoveryEngine::new(config.discovery.clone());
        let collector = Arc::new(ReviewCollector::new(config.reviews.clone()));

        Self {
            config,
            environment,
            store,
            sessions,
            discovery,
            collector,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Metadata client; fails when `TMDB_API_KEY` is unset
    pub fn metadata(&self) -> Result<Arc<TmdbClient>> {
        let api_key = self.environment.api_key()?;
        Ok(Arc::new(TmdbClient::new(api_key, self.config.enrichment.clone())?))
    }

    pub fn worker_pool(&self) -> ReviewWorkerPool<ChromeSessionFactory> {
        ReviewWorkerPool::new(
            self.sessions.clone(),
            self.collector.clone(),
            self.config.pipeline.workers,
            self.running.clone(),
        )
    }

    pub fn pipeline<M: MetadataClient>(
        &self,
        metadata: Arc<M>,
    ) -> Pipeline<M, SqliteStore, ChromeSessionFactory> {
        Pipeline::new(
            metadata,
            self.store.clone(),
            self.sessions.clone(),
            self.collector.clone(),
            self.config.pipeline.clone(),
            self.running.clone(),
        )
    }

    pub fn require_running(&self) -> Result<()> {
        if self.running.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CrawlerError::Other("Interrupted".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::store::DocumentStore;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn environment(url: Option<String>, key: Option<&str>) -> Environment {
        Environment {
            tmdb_api_key: key.map(str::to_string),
            database_url: url,
            database_name: "test_crawl".into(),
        }
    }

    #[test]
    fn test_new_creates_database_directory() {
        let dir = TempDir::new().unwrap();
        let db_dir = dir.path().join("nested").join("db");
        let env = environment(Some(format!("sqlite://{}", db_dir.display())), None);

        let ctx = AppContext::new(Config::default(), env).unwrap();
        assert!(db_dir.join("test_crawl.db").exists());
        assert_eq!(ctx.store.count("movie_genres").unwrap(), 0);
    }

    #[test]
    fn test_metadata_requires_api_key() {
        let ctx = AppContext::in_memory(Config::default(), environment(None, None)).unwrap();
        assert!(matches!(
            ctx.metadata(),
            Err(CrawlerError::Config(msg)) if msg.contains("TMDB_API_KEY")
        ));

        let ctx = AppContext::in_memory(Config::default(), environment(None, Some("k"))).unwrap();
        assert!(ctx.metadata().is_ok());
    }

    #[test]
    fn test_require_running() {
        let ctx = AppContext::in_memory(Config::default(), environment(None, None)).unwrap();
        assert!(ctx.require_running().is_ok());
        ctx.running.store(false, Ordering::SeqCst);
        assert!(ctx.require_running().is_err());
    }

    #[test]
    fn test_config_error_converts() {
        let err: CrawlerError = ConfigError::MissingVariable("TMDB_API_KEY").into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Environment variable TMDB_API_KEY is not set"
        );
    }
}
