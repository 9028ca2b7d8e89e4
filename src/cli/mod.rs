pub mod commands;

use std::path::PathBuf;

use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};

use crate::app::{CrawlerError, Result};

#[derive(Parser)]
#[command(name = "cinecrawl")]
#[command(about = "Collect IMDb movie reviews and TMDB metadata", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/cinecrawl/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of concurrent review workers, each with its own browser
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover movies released in a date range and write them to a staging file
    Discover {
        #[command(flatten)]
        range: DateRange,

        /// Stop after this many movies
        #[arg(short, long)]
        limit: Option<usize>,

        /// Staging file to write
        #[arg(short, long, default_value = "movies.json")]
        output: PathBuf,
    },
    /// Collect reviews for the movies in a staging file
    Reviews {
        /// Staging file with the movies
        #[arg(short, long, default_value = "movies.json")]
        input: PathBuf,

        /// File the review collections are appended to
        #[arg(short, long, default_value = "reviews.json")]
        output: PathBuf,
    },
    /// Discover, enrich and store movies with their reviews
    Run {
        #[command(flatten)]
        range: DateRange,

        /// Stop after this many movies
        #[arg(short, long)]
        limit: Option<usize>,

        /// Read movies from a staging file instead of discovering them
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write discovered movies to this staging file
        #[arg(long)]
        staging: Option<PathBuf>,
    },
    /// Refresh the top popular movies and their reviews
    Popular {
        /// Where the ranking comes from
        #[arg(long, value_enum, default_value_t = PopularSource::Listing)]
        source: PopularSource,
    },
    /// Store the genre list
    Genres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PopularSource {
    /// Release-date listing, most popular first
    Listing,
    /// The metadata API's popular list
    Tmdb,
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct DateRange {
    /// First release date, YYYY-MM-DD (default: `recent_days` before --to)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last release date, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn resolve(&self, recent_days: u32) -> Result<(NaiveDate, NaiveDate)> {
        self.resolve_from(Local::now().date_naive(), recent_days)
    }

    fn resolve_from(&self, today: NaiveDate, recent_days: u32) -> Result<(NaiveDate, NaiveDate)> {
        let to = self.to.unwrap_or(today);
        let from = match self.from {
            Some(from) => from,
            None => to
                .checked_sub_days(Days::new(recent_days.into()))
                .unwrap_or(NaiveDate::MIN),
        };

        if from > to {
            return Err(CrawlerError::Config(format!(
                "--from {} is after --to {}",
                from, to
            )));
        }
        Ok((from, to))
    }
}
