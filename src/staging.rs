//! JSON staging files shared between the `discover`, `reviews` and `run`
//! commands.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::app::Result;
use crate::domain::{Movie, MovieReviewCollection};

pub fn read_movies(path: &Path) -> Result<Vec<Movie>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_movies(path: &Path, movies: &[Movie]) -> Result<()> {
    write_pretty(path, movies)?;
    debug!("Wrote {} movies to {}", movies.len(), path.display());
    Ok(())
}

/// Existing collections, or none when the file is missing or unreadable
pub fn read_collections_lenient(path: &Path) -> Vec<MovieReviewCollection> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    match serde_json::from_str(&content) {
        Ok(collections) => collections,
        Err(e) => {
            warn!("Ignoring malformed staging file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Add collections to the file, replacing any earlier entry for the same movie.
/// Failed collections are left out so they never replace staged reviews.
pub fn append_collections(path: &Path, fresh: Vec<MovieReviewCollection>) -> Result<usize> {
    let mut collections = read_collections_lenient(path);

    for collection in fresh {
        if collection.is_failed() {
            warn!("Not staging {}: no bucket could be read", collection.movie_id);
            continue;
        }
        match collections.iter_mut().find(|c| c.movie_id == collection.movie_id) {
            Some(existing) => *existing = collection,
            None => collections.push(collection),
        }
    }

    write_pretty(path, &collections)?;
    Ok(collections.len())
}

fn write_pretty<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
