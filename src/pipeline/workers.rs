use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserSession, SessionFactory};
use crate::domain::MovieReviewCollection;
use crate::reviews::ReviewCollector;

pub const DEFAULT_WORKERS: usize = 3;

/// Collects reviews for many movies on a bounded number of browser sessions.
///
/// Each worker slot owns at most one session at a time. Sessions are opened
/// lazily and reused by later movies until [`shutdown`](Self::shutdown). A
/// session on which any bucket failed is closed instead of being reused.
pub struct ReviewWorkerPool<F: SessionFactory> {
    factory: Arc<F>,
    collector: Arc<ReviewCollector>,
    semaphore: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<F::Session>>>,
    running: Arc<AtomicBool>,
}

impl<F: SessionFactory + 'static> ReviewWorkerPool<F> {
    pub fn new(
        factory: Arc<F>,
        collector: Arc<ReviewCollector>,
        workers: usize,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            factory,
            collector,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            idle: Arc::new(Mutex::new(Vec::new())),
            running,
        }
    }

    /// Collect every movie, returning collections in input order. Movies that
    /// could not get a session, or were not started before shutdown, are absent.
    pub async fn collect_all(&self, movie_ids: Vec<String>) -> Vec<MovieReviewCollection> {
        let mut handles = Vec::with_capacity(movie_ids.len());

        for movie_id in movie_ids {
            let factory = self.factory.clone();
            let collector = self.collector.clone();
            let semaphore = self.semaphore.clone();
            let idle = self.idle.clone();
            let running = self.running.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if !running.load(Ordering::SeqCst) {
                    debug!("Shutdown requested, not starting {}", movie_id);
                    return None;
                }

                let reused = idle.lock().ok().and_then(|mut sessions| sessions.pop());
                let mut session = match reused {
                    Some(session) => session,
                    None => match factory.open().await {
                        Ok(session) => session,
                        Err(e) => {
                            error!("Could not open a browser session for {}: {}", movie_id, e);
                            return None;
                        }
                    },
                };

                let state = collector.collect_session(&mut session, &movie_id).await;

                if state.failed_buckets().is_empty() {
                    if let Ok(mut sessions) = idle.lock() {
                        sessions.push(session);
                    }
                } else {
                    warn!(
                        "Discarding browser session after failed buckets {:?} of {}",
                        state.failed_buckets(),
                        movie_id
                    );
                    if let Err(e) = session.close().await {
                        debug!("Error closing session: {}", e);
                    }
                }
                Some(state.finish())
            });

            handles.push(handle);
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(collection)) => results.push(collection),
                Ok(None) => {}
                Err(e) => {
                    error!("Review task join error: {}", e);
                }
            }
        }

        results
    }

    /// Close every idle session
    pub async fn shutdown(&self) {
        let sessions = self
            .idle
            .lock()
            .map(|mut sessions| std::mem::take(&mut *sessions))
            .unwrap_or_default();

        if !sessions.is_empty() {
            info!("Closing {} browser sessions", sessions.len());
        }
        for mut session in sessions {
            if let Err(e) = session.close().await {
                debug!("Error closing session: {}", e);
            }
        }
    }
}
