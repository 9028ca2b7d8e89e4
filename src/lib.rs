//! # cinecrawl
//!
//! Collects movies and their user reviews from IMDb, enriches them with TMDB
//! metadata and keeps everything in a local document store.
//!
//! ## Architecture
//!
//! ```text
//! Discovery → Staging → Enrichment → Reviews → Store
//! ```
//!
//! - [`discovery`]: walks the release-date listing and reveals every title
//! - [`reviews`]: visits each rating bucket and reveals every review
//! - [`enrichment`]: TMDB client with rate-limit aware retries
//! - [`pipeline`]: batches, worker pool and persistence
//! - [`store`]: SQLite document store
//!
//! ## Quick Start
//!
//! ```bash
//! export TMDB_API_KEY=...
//!
//! # Discover last week's releases into movies.json
//! cinecrawl discover
//!
//! # Collect their reviews into reviews.json
//! cinecrawl reviews
//!
//! # Everything at once, stored in the database
//! cinecrawl run --from 2024-10-01 --to 2024-10-07
//!
//! # Refresh the popular movies
//! cinecrawl popular
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// browser sessions, collectors and the metadata client.
pub mod app;

/// Browser sessions.
///
/// - [`BrowserSession`](browser::BrowserSession): async trait over one page
/// - [`ChromeSession`](browser::ChromeSession): headless Chrome via chromiumoxide
/// - [`ReplaySession`](browser::ReplaySession): scripted pages for offline runs
pub mod browser;

/// Command-line interface using clap.
pub mod cli;

/// Configuration file and environment.
///
/// Loads from `~/.config/cinecrawl/config.toml`; credentials and the
/// database location come from `TMDB_API_KEY`, `DATABASE_URL` and
/// `DATABASE_NAME`.
pub mod config;

/// Movie listing discovery.
pub mod discovery;

/// Core domain models: [`Movie`](domain::Movie), [`Review`](domain::Review)
/// and [`MovieReviewCollection`](domain::MovieReviewCollection).
pub mod domain;

/// TMDB metadata client.
pub mod enrichment;

/// Listing and review markup parsing.
pub mod parser;

/// Batch enrichment, review collection and persistence.
pub mod pipeline;

/// Reveal strategies and adaptive delays.
pub mod reveal;

/// Review collection across rating buckets.
pub mod reviews;

/// JSON staging files.
pub mod staging;

/// SQLite document store.
///
/// - [`DocumentStore`](store::DocumentStore): trait over JSON documents
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
