use std::path::PathBuf;

use crate::config::ConfigError;

pub const TMDB_API_KEY: &str = "TMDB_API_KEY";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_NAME: &str = "DATABASE_NAME";

pub const DEFAULT_DATABASE_NAME: &str = "cinecrawl";
pub const MAX_DATABASE_NAME_LEN: usize = 38;

/// Credentials and database location, read from the process environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub tmdb_api_key: Option<String>,
    /// Directory holding the database, optionally written as `sqlite://<dir>`
    pub database_url: Option<String>,
    /// Already normalized
    pub database_name: String,
}

impl Environment {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_name = match non_empty(DATABASE_NAME) {
            Some(raw) => normalize_database_name(&raw)?,
            None => DEFAULT_DATABASE_NAME.to_string(),
        };

        Ok(Self {
            tmdb_api_key: non_empty(TMDB_API_KEY),
            database_url: non_empty(DATABASE_URL),
            database_name,
        })
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.tmdb_api_key
            .as_deref()
            .ok_or(ConfigError::MissingVariable(TMDB_API_KEY))
    }

    /// `<DATABASE_URL or data dir>/<DATABASE_NAME>.db`
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let dir = match self.database_url.as_deref() {
            Some(url) => PathBuf::from(url.strip_prefix("sqlite://").unwrap_or(url)),
            None => dirs::data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("cinecrawl"),
        };
        Ok(dir.join(format!("{}.db", self.database_name)))
    }
}

/// Spaces become underscores; names longer than 38 characters are rejected
pub fn normalize_database_name(raw: &str) -> Result<String, ConfigError> {
    let name = raw.trim().replace(' ', "_");
    let len = name.chars().count();
    if len > MAX_DATABASE_NAME_LEN {
        return Err(ConfigError::DatabaseNameTooLong { name, len });
    }
    Ok(name)
}
