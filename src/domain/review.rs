use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const NO_SUMMARY: &str = "No summary";
pub const NO_CONTENT: &str = "No content";
pub const NO_RATING: &str = "No rating";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const NO_DATE: &str = "No date";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "Review Summary")]
    pub summary: String,
    #[serde(rename = "Review")]
    pub body: String,
    #[serde(rename = "Rating")]
    pub rating: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Helpful", default)]
    pub helpful: u64,
    #[serde(rename = "Not Helpful", default)]
    pub unhelpful: u64,
}

impl Default for Review {
    fn default() -> Self {
        Self {
            summary: NO_SUMMARY.to_string(),
            body: NO_CONTENT.to_string(),
            rating: NO_RATING.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            date: NO_DATE.to_string(),
            helpful: 0,
            unhelpful: 0,
        }
    }
}

impl Review {
    /// Deterministic key used to drop the same review seen in more than one rating bucket.
    ///
    /// The site exposes no review id, so the key hashes author, date, summary and body.
    pub fn dedup_key(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [&self.author, &self.date, &self.summary, &self.body] {
            hasher.update(field.as_bytes());
            hasher.update([0x1fu8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Parse the review date (`"7 October 2024"` or `"Oct 7, 2024"`)
    pub fn parsed_date(&self) -> Option<chrono::NaiveDate> {
        ["%e %B %Y", "%d %B %Y", "%b %e, %Y", "%b %d, %Y", "%B %e, %Y"]
            .iter()
            .find_map(|fmt| chrono::NaiveDate::parse_from_str(self.date.trim(), fmt).ok())
    }
}
