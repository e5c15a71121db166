//! Collection overview for `roster stats`.
//!
//! Shows how many profiles are stored, progress toward the attendee target,
//! the school breakdown and the selected ranking model.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::search;
use crate::store::ProfileStore;

/// Run the stats command: load the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = ProfileStore::open(config).await?;
    let stats = store.stats();
    let model = search::selected_model(&store, &config.search).await;

    let mut per_school: BTreeMap<&str, usize> = BTreeMap::new();
    for p in store.profiles() {
        let school = p.school.as_deref().filter(|s| !s.is_empty()).unwrap_or("(none)");
        *per_school.entry(school).or_default() += 1;
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Roster — Collection Stats");
    println!("=========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  Profiles:    {} / {} ({:.0}%)",
        stats.total, stats.target, stats.progress_percent
    );
    println!("  Schools:     {}", stats.schools);
    match &model {
        Ok(m) => println!("  Model:       {}", m),
        Err(e) => println!("  Model:       unknown ({})", e),
    }

    if !per_school.is_empty() {
        println!();
        println!("  By school:");
        let width = per_school.keys().map(|s| s.chars().count()).max().unwrap_or(0);
        for (school, count) in &per_school {
            println!("    {:<width$}  {}", school, count, width = width);
        }
    }

    store.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
