use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::app::{CrawlerError, Result};

/// Backoff rules for the metadata API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per request, first one included (default: 3)
    pub max_attempts: u32,
    /// 429 waits `rate_limit_base_secs * 2^attempt` (default: 1)
    pub rate_limit_base_secs: f64,
    /// 500 and 503 wait a fixed time (default: 2)
    pub server_error_wait_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_base_secs: 1.0,
            server_error_wait_secs: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn rate_limit_wait(&self, attempt: u32) -> Duration {
        secs(self.rate_limit_base_secs * 2f64.powi(attempt as i32))
    }

    pub fn server_error_wait(&self) -> Duration {
        secs(self.server_error_wait_secs)
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// What a single HTTP attempt came back with
#[derive(Debug)]
pub enum HttpReply {
    Json(Value),
    Status(u16),
}

enum Failure {
    RateLimited,
    Server(u16),
}

/// Run `attempt` until it yields JSON, retrying 429 with exponential backoff
/// and 500/503 with a fixed wait. Any other status fails immediately.
pub async fn with_retries<F, Fut>(url: &str, policy: &RetryPolicy, mut attempt: F) -> Result<Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpReply>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last = None;

    for n in 0..attempts {
        let wait = match attempt().await? {
            HttpReply::Json(value) => return Ok(value),
            HttpReply::Status(429) => {
                warn!("Rate limited on attempt {}", n + 1);
                last = Some(Failure::RateLimited);
                policy.rate_limit_wait(n)
            }
            HttpReply::Status(status @ (500 | 503)) => {
                error!("Server error {} on attempt {}", status, n + 1);
                last = Some(Failure::Server(status));
                policy.server_error_wait()
            }
            HttpReply::Status(status) => {
                return Err(CrawlerError::HttpStatus {
                    url: url.to_string(),
                    status,
                });
            }
        };

        if n + 1 < attempts {
            debug!("Retrying {} in {:?}", url, wait);
            tokio::time::sleep(wait).await;
        }
    }

    Err(match last {
        Some(Failure::RateLimited) => CrawlerError::RateLimitExceeded {
            url: url.to_string(),
            attempts,
        },
        Some(Failure::Server(status)) => CrawlerError::ExhaustedRetries {
            url: url.to_string(),
            attempts,
            last: Box::new(CrawlerError::TransientServerError {
                url: url.to_string(),
                status,
            }),
        },
        None => CrawlerError::Other(format!("No attempt made for {}", url)),
    })
}
