use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder used when a listing card has no link or title
pub const MISSING_IDENTIFIER: &str = "N/A";

static ORDINAL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("ordinal prefix regex should compile"));

/// A movie card exactly as found in the listing markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMovieCard {
    pub title: Option<String>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(rename = "Movie ID")]
    pub id: String,
    #[serde(rename = "Title")]
    pub title: String,
}

impl Movie {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: normalize_title(&title.into()),
        }
    }

    /// Build a movie from a listing card, tagging unresolvable fields with "N/A"
    pub fn from_card(card: &RawMovieCard) -> Self {
        let id = card
            .href
            .as_deref()
            .and_then(extract_identifier)
            .unwrap_or(MISSING_IDENTIFIER)
            .to_string();

        let title = card
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(MISSING_IDENTIFIER);

        Self::new(id, title)
    }

    pub fn has_identifier(&self) -> bool {
        !self.id.is_empty() && self.id != MISSING_IDENTIFIER
    }
}

/// Strip a leading ranking ordinal such as `"12. "` from a listing title
pub fn normalize_title(title: &str) -> String {
    ORDINAL_PREFIX.replace(title.trim(), "").into_owned()
}

/// Pull the `tt…` identifier out of a `/title/{id}/…` link
pub fn extract_identifier(href: &str) -> Option<&str> {
    let (_, rest) = href.split_once("/title/")?;
    let id = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("");

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}
