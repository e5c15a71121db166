//! One-time seed prefetch for an empty collection.

use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::models::AttendeeProfile;

/// `GET` a JSON array of attendee records from `url`.
pub async fn fetch_seed(url: &str, timeout_secs: u64) -> Result<Vec<AttendeeProfile>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Seed request to {} failed", url))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Seed source returned {}: {}", status, body);
    }

    let text = response.text().await?;
    crate::store::parse_import(&text).with_context(|| format!("Invalid seed data from {}", url))
}
