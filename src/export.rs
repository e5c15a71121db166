//! Whole-collection export and import files.
//!
//! Export writes the pretty-printed collection, the same document the web
//! page offered as a download. Import merges a JSON array of profiles using
//! the store's `url` deduplication.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;

use crate::config::Config;
use crate::store::{parse_import, ProfileStore};

/// Default export file name for `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("attendees-database-{}.json", date.format("%Y-%m-%d"))
}

/// Export the collection.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes to
/// today's default file name in the working directory.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let store = ProfileStore::open(config).await?;
    let snapshot = store.export_snapshot()?;
    let count = store.len();
    store.close().await;

    let default_path;
    let path = match output {
        Some(p) => p,
        None => {
            default_path = export_file_name(chrono::Local::now().date_naive());
            Path::new(&default_path)
        }
    };

    std::fs::write(path, snapshot)
        .with_context(|| format!("Failed to write export file: {}", path.display()))?;
    println!("Exported {} profiles to {}", count, path.display());
    Ok(())
}

/// Merge profiles from a JSON array file.
pub async fn run_import(config: &Config, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;
    let candidates = parse_import(&text).context("Error importing file")?;
    let offered = candidates.len();

    let mut store = ProfileStore::open(config).await?;
    let added = store.import_merge(candidates).await;
    store.close().await;
    let added = added?;

    println!("Imported {} new profiles", added);
    if added < offered {
        println!("Skipped {} already in the database", offered - added);
    }
    Ok(())
}
