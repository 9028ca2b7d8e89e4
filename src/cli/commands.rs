use std::path::Path;

use chrono::{Local, NaiveDate};
use tracing::warn;

use crate::app::{AppContext, Result};
use crate::browser::{BrowserSession, SessionFactory};
use crate::cli::{DateRange, PopularSource};
use crate::domain::Movie;
use crate::pipeline::{popular_from_catalog, PipelineSummary};
use crate::staging;

/// Run discovery on a fresh browser session, closing it whatever the outcome
async fn discover_movies(
    ctx: &AppContext,
    from: NaiveDate,
    to: NaiveDate,
    limit: Option<usize>,
) -> Result<Vec<Movie>> {
    let mut session = ctx.sessions.open().await?;
    let report = ctx.discovery.discover(&mut session, from, to, limit).await;

    if let Err(e) = session.close().await {
        warn!("Error closing discovery session: {}", e);
    }

    let report = report?;
    if let Some(total) = report.reported_total {
        println!(
            "Listing reports {} titles, {} revealed with {} clicks",
            total, report.cards_seen, report.reveals
        );
    }
    Ok(report.movies)
}

pub async fn discover(
    ctx: &AppContext,
    range: &DateRange,
    limit: Option<usize>,
    output: &Path,
) -> Result<()> {
    let (from, to) = range.resolve(ctx.config.pipeline.recent_days)?;
    println!("Discovering movies released {} to {}...", from, to);

    let movies = discover_movies(ctx, from, to, limit).await?;
    staging::write_movies(output, &movies)?;

    println!("Wrote {} movies to {}", movies.len(), output.display());
    Ok(())
}

pub async fn reviews(ctx: &AppContext, input: &Path, output: &Path) -> Result<()> {
    let movies = staging::read_movies(input)?;
    let ids: Vec<String> = movies
        .into_iter()
        .filter(Movie::has_identifier)
        .map(|m| m.id)
        .collect();

    if ids.is_empty() {
        println!("No movies to collect");
        return Ok(());
    }

    println!("Collecting reviews for {} movies...", ids.len());
    let pool = ctx.worker_pool();
    let collections = pool.collect_all(ids).await;
    pool.shutdown().await;

    for collection in &collections {
        let marker = if collection.is_failed() {
            "x"
        } else if collection.is_incomplete() {
            "!"
        } else {
            " "
        };
        println!(
            "{} {} {}/{} reviews",
            marker,
            collection.movie_id,
            collection.reviews.len(),
            collection.expected_total
        );
    }

    let stored = staging::append_collections(output, collections)?;
    println!("{} collections in {}", stored, output.display());
    Ok(())
}

pub async fn run(
    ctx: &AppContext,
    range: &DateRange,
    limit: Option<usize>,
    input: Option<&Path>,
    staging_path: Option<&Path>,
) -> Result<()> {
    let metadata = ctx.metadata()?;

    let movies = match input {
        Some(path) => staging::read_movies(path)?,
        None => {
            let (from, to) = range.resolve(ctx.config.pipeline.recent_days)?;
            println!("Discovering movies released {} to {}...", from, to);
            discover_movies(ctx, from, to, limit).await?
        }
    };

    if let Some(path) = staging_path {
        staging::write_movies(path, &movies)?;
    }
    ctx.require_running()?;

    println!("Processing {} movies...", movies.len());
    let pipeline = ctx.pipeline(metadata);
    let summary = pipeline.run(movies).await;
    pipeline.shutdown().await;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &PipelineSummary) {
    println!(
        "Run complete: {} movies in {} batches",
        summary.movies, summary.batches
    );
    println!(
        "  {} enriched, {} not in catalog, {} without identifier, {} enrichment errors",
        summary.enriched,
        summary.not_in_catalog,
        summary.missing_identifier,
        summary.enrichment_failures
    );
    println!(
        "  {} review collections ({} reviews, {} incomplete), {} failed, {} persistence errors",
        summary.collections_saved,
        summary.reviews_saved,
        summary.incomplete_collections,
        summary.failed_collections,
        summary.persistence_failures
    );
}

pub async fn popular(ctx: &AppContext, source: PopularSource) -> Result<()> {
    let metadata = ctx.metadata()?;
    let top_n = ctx.config.pipeline.popular_top_n;

    let movies = match source {
        PopularSource::Listing => {
            let from = ctx.config.pipeline.popular_since;
            let to = Local::now().date_naive();
            discover_movies(ctx, from, to, Some(top_n)).await?
        }
        PopularSource::Tmdb => popular_from_catalog(metadata.as_ref(), top_n).await?,
    };
    ctx.require_running()?;

    println!("Refreshing {} popular movies...", movies.len().min(top_n));
    let pipeline = ctx.pipeline(metadata);
    let summary = pipeline.refresh_popular(movies).await;
    pipeline.shutdown().await;

    println!(
        "Popular refresh complete: {} refreshed, {} new reviews, {} removed, {} failed",
        summary.refreshed, summary.reviews_added, summary.removed, summary.failed
    );
    Ok(())
}

pub async fn genres(ctx: &AppContext) -> Result<()> {
    let pipeline = ctx.pipeline(ctx.metadata()?);
    let saved = pipeline.ensure_genres().await?;

    if saved == 0 {
        println!("Genres already stored");
    } else {
        println!("Stored {} genres", saved);
    }
    Ok(())
}
