//! One-way bulk backup to a remote persistence service.
//!
//! The collection is posted in batches of `sync.batch_size` as
//! `{"attendees": [...]}`. Each batch answers with
//! `{"success": n, "failed": n, "errors": [{"id", "name", "error"}]}`. A batch
//! that fails outright counts all of its records as failed and the sync
//! moves on to the next batch.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::AttendeeProfile;
use crate::store::ProfileStore;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SyncError {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    success: usize,
    #[serde(default)]
    failed: usize,
    #[serde(default)]
    errors: Vec<SyncError>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SyncReport {
    pub batches: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<SyncError>,
}

/// Post `profiles` to `url` in batches.
pub async fn sync_profiles(
    url: &str,
    profiles: &[AttendeeProfile],
    batch_size: usize,
    timeout_secs: u64,
) -> Result<SyncReport> {
    if batch_size == 0 {
        bail!("sync batch size must be > 0");
    }
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;

    let mut report = SyncReport::default();
    for (i, batch) in profiles.chunks(batch_size).enumerate() {
        report.batches += 1;
        match post_batch(&client, url, batch).await {
            Ok(resp) => {
                info!(
                    batch = i + 1,
                    success = resp.success,
                    failed = resp.failed,
                    "synced batch"
                );
                report.success += resp.success;
                report.failed += resp.failed;
                report.errors.extend(resp.errors);
            }
            Err(e) => {
                warn!(batch = i + 1, error = %e, "batch failed");
                report.failed += batch.len();
                report.errors.push(SyncError {
                    id: None,
                    name: None,
                    error: format!("batch {}: {}", i + 1, e),
                });
            }
        }
    }

    Ok(report)
}

async fn post_batch(
    client: &reqwest::Client,
    url: &str,
    batch: &[AttendeeProfile],
) -> Result<BatchResponse> {
    let response = client
        .post(url)
        .json(&serde_json::json!({ "attendees": batch }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("HTTP {}: {}", status, body);
    }
    Ok(response.json().await?)
}

/// `roster sync`.
pub async fn run_sync(config: &Config) -> Result<()> {
    let Some(url) = config.sync.url.as_deref() else {
        bail!("No sync endpoint configured. Set [sync] url in the config file.");
    };

    let store = ProfileStore::open(config).await?;
    if store.is_empty() {
        println!("Nothing to sync.");
        store.close().await;
        return Ok(());
    }

    let report = sync_profiles(
        url,
        store.profiles(),
        config.sync.batch_size,
        config.search.timeout_secs,
    )
    .await;
    store.close().await;
    let report = report?;

    println!(
        "Synced {} profiles in {} batches: {} succeeded, {} failed",
        store.len(),
        report.batches,
        report.success,
        report.failed
    );
    for err in &report.errors {
        match &err.name {
            Some(name) => eprintln!("  {}: {}", name, err.error),
            None => eprintln!("  {}", err.error),
        }
    }

    Ok(())
}
