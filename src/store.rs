//! The profile store: an ordered attendee collection mirrored to a slot.
//!
//! Every mutating operation writes the whole collection back to the
//! [`SlotStore`] before it returns. There is no journal and no batching.
//!
//! # Deduplication
//!
//! A profile's `url` is its natural key. [`ProfileStore::add`] rejects a
//! profile whose `url` is already stored and [`ProfileStore::import_merge`]
//! silently skips such candidates. Profiles without a `url` are never
//! considered duplicates of each other.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{AttendeeProfile, ProfileId};
use crate::seed;
use crate::slots::{SlotStore, SqliteSlots, ATTENDEES_SLOT, MODEL_SLOT};

/// Where a corrupt collection is parked before the store resets to empty.
pub const CORRUPT_SLOT: &str = "attendeesDatabase.corrupt";

/// Collection size the progress figure in [`StoreStats`] is measured against.
pub const TARGET_ATTENDEES: usize = 700;

/// Result of [`ProfileStore::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(ProfileId),
    /// A profile with the same `url` is already stored; nothing changed.
    Duplicate { url: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format. Expected an array of attendees.")]
    NotAnArray,

    #[error("Expected a single profile object")]
    NotAnObject,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub target: usize,
    /// Share of `target` reached, capped at 100.
    pub progress_percent: f64,
    pub schools: usize,
}

pub struct ProfileStore {
    profiles: Vec<AttendeeProfile>,
    slots: Arc<dyn SlotStore>,
}

impl ProfileStore {
    /// Read the collection from storage.
    ///
    /// A missing slot yields an empty store. A slot that does not parse is
    /// copied to [`CORRUPT_SLOT`] and the store starts empty, so a damaged
    /// file never blocks startup.
    pub async fn load(slots: Arc<dyn SlotStore>) -> Result<Self> {
        let stored = slots
            .get(ATTENDEES_SLOT)
            .await
            .context("Failed to read attendee collection")?;

        let profiles = match stored {
            None => Vec::new(),
            Some(text) => match serde_json::from_str::<Vec<AttendeeProfile>>(&text) {
                Ok(profiles) => profiles,
                Err(e) => {
                    warn!(error = %e, "stored attendee collection is corrupt, starting empty");
                    if let Err(e) = slots.put(CORRUPT_SLOT, &text).await {
                        warn!(error = %e, "could not keep a copy of the corrupt collection");
                    }
                    Vec::new()
                }
            },
        };

        debug!(count = profiles.len(), "loaded attendee collection");
        Ok(Self { profiles, slots })
    }

    /// Like [`load`](Self::load), then fetch the seed collection once if the
    /// store is empty and a seed URL is configured. Seed failures are logged
    /// and leave the store empty.
    pub async fn load_or_seed(
        slots: Arc<dyn SlotStore>,
        seed_url: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let mut store = Self::load(slots).await?;

        if let (true, Some(url)) = (store.is_empty(), seed_url) {
            match seed::fetch_seed(url, timeout_secs).await {
                Ok(candidates) => {
                    let added = store.import_merge(candidates).await?;
                    info!(added, url, "seeded empty attendee collection");
                }
                Err(e) => warn!(error = %e, url, "seed prefetch failed"),
            }
        }

        Ok(store)
    }

    /// Open the configured database and load it, seeding an empty
    /// collection from `[seed] url` when one is set.
    pub async fn open(config: &Config) -> Result<Self> {
        let slots = Arc::new(SqliteSlots::open(config).await?);
        Self::load_or_seed(slots, config.seed.url.as_deref(), config.search.timeout_secs).await
    }

    /// Release the underlying storage.
    pub async fn close(&self) {
        self.slots.close().await;
    }

    pub fn profiles(&self) -> &[AttendeeProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, id: &ProfileId) -> Option<&AttendeeProfile> {
        self.profiles.iter().find(|p| p.has_id(id))
    }

    fn contains_url(&self, url: &str) -> bool {
        self.profiles.iter().any(|p| p.url.as_deref() == Some(url))
    }

    /// Assign a fresh id and timestamp and append, unless the `url` is taken.
    pub async fn add(&mut self, mut profile: AttendeeProfile) -> Result<AddOutcome> {
        if let Some(url) = profile.url.as_deref() {
            if self.contains_url(url) {
                return Ok(AddOutcome::Duplicate {
                    url: url.to_string(),
                });
            }
        }

        let id = ProfileId::generate();
        profile.id = Some(id.clone());
        profile.added_at = Some(Utc::now());

        let name = profile.display_name().to_string();
        let mut next = self.profiles.clone();
        next.push(profile);
        self.commit(next).await?;
        info!(id = %id, name = %name, "added profile");
        Ok(AddOutcome::Added(id))
    }

    /// Remove the profile with `id`. Returns whether anything was removed;
    /// removing an unknown id is a no-op.
    pub async fn remove(&mut self, id: &ProfileId) -> Result<bool> {
        let next: Vec<AttendeeProfile> = self
            .profiles
            .iter()
            .filter(|p| !p.has_id(id))
            .cloned()
            .collect();
        let removed = next.len() != self.profiles.len();
        self.commit(next).await?;
        Ok(removed)
    }

    /// Append every candidate whose `url` is not already present, keeping
    /// its id and timestamp. Returns the number added.
    ///
    /// Candidates without an id, or whose id is already used, get a new one.
    pub async fn import_merge(&mut self, candidates: Vec<AttendeeProfile>) -> Result<usize> {
        let mut seen_urls: HashSet<String> = self
            .profiles
            .iter()
            .filter_map(|p| p.url.clone())
            .collect();

        let mut next = self.profiles.clone();
        let mut added = 0;
        for mut candidate in candidates {
            if let Some(url) = &candidate.url {
                if !seen_urls.insert(url.clone()) {
                    continue;
                }
            }

            let needs_id = match &candidate.id {
                None => true,
                Some(id) => next.iter().any(|p| p.has_id(id)),
            };
            if needs_id {
                candidate.id = Some(ProfileId::generate());
            }

            next.push(candidate);
            added += 1;
        }

        self.commit(next).await?;
        info!(added, total = self.profiles.len(), "imported profiles");
        Ok(added)
    }

    pub async fn clear(&mut self) -> Result<()> {
        let removed = self.profiles.len();
        self.commit(Vec::new()).await?;
        info!(removed, "cleared attendee collection");
        Ok(())
    }

    /// Pretty-printed JSON array of the whole collection.
    pub fn export_snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.profiles)?)
    }

    /// Distinct non-empty schools, sorted, for the category filter.
    pub fn schools(&self) -> Vec<&str> {
        let mut schools: Vec<&str> = self
            .profiles
            .iter()
            .filter_map(|p| p.school.as_deref())
            .filter(|s| !s.is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        schools.sort_unstable();
        schools
    }

    pub fn stats(&self) -> StoreStats {
        let total = self.profiles.len();
        StoreStats {
            total,
            target: TARGET_ATTENDEES,
            progress_percent: ((total as f64 / TARGET_ATTENDEES as f64) * 100.0).min(100.0),
            schools: self.schools().len(),
        }
    }

    pub async fn selected_model(&self) -> Result<Option<String>> {
        self.slots.get(MODEL_SLOT).await
    }

    pub async fn set_selected_model(&self, model: &str) -> Result<()> {
        self.slots.put(MODEL_SLOT, model).await
    }

    /// Write `next` to storage, then adopt it. On failure the in-memory
    /// collection is left as it was.
    async fn commit(&mut self, next: Vec<AttendeeProfile>) -> Result<()> {
        let json = serde_json::to_string(&next)?;
        self.slots
            .put(ATTENDEES_SLOT, &json)
            .await
            .context("Failed to persist attendee collection")?;
        self.profiles = next;
        Ok(())
    }
}

/// Parse an import document, which must be a JSON array of profiles.
pub fn parse_import(text: &str) -> std::result::Result<Vec<AttendeeProfile>, ImportError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_array() {
        return Err(ImportError::NotAnArray);
    }
    Ok(serde_json::from_value(value)?)
}

/// Parse the manual add form: one profile object plus optional overrides.
///
/// `school` always replaces the parsed value; `image` only fills a missing one.
pub fn parse_profile_input(
    text: &str,
    school: Option<&str>,
    image: Option<&str>,
) -> std::result::Result<AttendeeProfile, ImportError> {
    let value: serde_json::Value = serde_json::from_str(text.trim())?;
    if !value.is_object() {
        return Err(ImportError::NotAnObject);
    }
    let mut profile: AttendeeProfile = serde_json::from_value(value)?;

    if let Some(school) = school.map(str::trim).filter(|s| !s.is_empty()) {
        profile.school = Some(school.to_string());
    }
    if let Some(image) = image.map(str::trim).filter(|s| !s.is_empty()) {
        if profile.image.is_none() {
            profile.image = Some(image.to_string());
        }
    }

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::MemorySlots;

    fn profile(name: &str, url: &str) -> AttendeeProfile {
        AttendeeProfile {
            name: Some(name.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    async fn empty_store() -> ProfileStore {
        ProfileStore::load(Arc::new(MemorySlots::new())).await.unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let mut store = empty_store().await;
        let first = store.add(profile("Alice", "u1")).await.unwrap();
        assert!(matches!(first, AddOutcome::Added(_)));

        let second = store.add(profile("Bob", "u1")).await.unwrap();
        assert_eq!(
            second,
            AddOutcome::Duplicate {
                url: "u1".to_string()
            }
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.profiles()[0].name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_seed_runs_only_on_empty_store() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id": 1, "name": "Seeded", "url": "s1"}]"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let slots: Arc<dyn SlotStore> = Arc::new(MemorySlots::new());
        let seeded = ProfileStore::load_or_seed(slots.clone(), Some(&server.uri()), 5)
            .await
            .unwrap();
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded.profiles()[0].id, Some(ProfileId::from("1")));

        let reopened = ProfileStore::load_or_seed(slots, Some(&server.uri()), 5)
            .await
            .unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_failure_leaves_store_empty() {
        let store = ProfileStore::load_or_seed(
            Arc::new(MemorySlots::new()),
            Some("http://127.0.0.1:9/seed.json"),
            2,
        )
        .await
        .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_timestamp() {
        let mut store = empty_store().await;
        let outcome = store.add(profile("Alice", "u1")).await.unwrap();
        let AddOutcome::Added(id) = outcome else {
            panic!("expected Added");
        };
        let stored = store.get(&id).unwrap();
        assert!(stored.added_at.is_some());
    }

    #[tokio::test]
    async fn test_profiles_without_url_do_not_collide() {
        let mut store = empty_store().await;
        let a = AttendeeProfile {
            name: Some("A".into()),
            ..Default::default()
        };
        let b = AttendeeProfile {
            name: Some("B".into()),
            ..Default::default()
        };
        store.add(a).await.unwrap();
        assert!(matches!(store.add(b).await.unwrap(), AddOutcome::Added(_)));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let mut store = empty_store().await;
        let AddOutcome::Added(id) = store.add(profile("Alice", "u1")).await.unwrap() else {
            panic!("expected Added");
        };

        assert!(store.remove(&id).await.unwrap());
        assert!(store.get(&id).is_none());
        assert!(!store.remove(&id).await.unwrap());
        assert!(!store.remove(&ProfileId::from("never-existed")).await.unwrap());
        assert!(store.get(&ProfileId::from("never-existed")).is_none());
    }

    #[tokio::test]
    async fn test_import_merge_skips_known_urls() {
        let mut store = empty_store().await;
        store.add(profile("Alice", "u1")).await.unwrap();

        let added = store
            .import_merge(vec![
                profile("Alice again", "u1"),
                profile("Bob", "u2"),
                profile("Bob twin", "u2"),
            ])
            .await
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(store.len(), 2);
        assert!(store.profiles().iter().all(|p| p.id.is_some()));
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let mut source = empty_store().await;
        source.add(profile("Alice", "u1")).await.unwrap();
        let mut bob = profile("Bob", "u2");
        bob.skills = vec!["Rust".into(), "Go".into()];
        bob.extra
            .insert("connections".into(), serde_json::json!("500+"));
        source.add(bob).await.unwrap();

        let snapshot = source.export_snapshot().unwrap();

        let mut target = empty_store().await;
        let added = target
            .import_merge(parse_import(&snapshot).unwrap())
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(target.profiles(), source.profiles());
    }

    #[tokio::test]
    async fn test_mutations_persist() {
        let slots: Arc<dyn SlotStore> = Arc::new(MemorySlots::new());
        let mut store = ProfileStore::load(slots.clone()).await.unwrap();
        store.add(profile("Alice", "u1")).await.unwrap();

        let reloaded = ProfileStore::load(slots.clone()).await.unwrap();
        assert_eq!(reloaded.len(), 1);

        store.clear().await.unwrap();
        let reloaded = ProfileStore::load(slots).await.unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_slot_loads_empty_and_keeps_copy() {
        let slots = Arc::new(MemorySlots::with_value(ATTENDEES_SLOT, "{not json"));
        let store = ProfileStore::load(slots.clone()).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(
            slots.get(CORRUPT_SLOT).await.unwrap().as_deref(),
            Some("{not json")
        );
    }

    /// Reads through to `inner`; every write fails.
    struct ReadOnlySlots {
        inner: MemorySlots,
    }

    #[async_trait::async_trait]
    impl SlotStore for ReadOnlySlots {
        async fn get(&self, name: &str) -> Result<Option<String>> {
            self.inner.get(name).await
        }

        async fn put(&self, _name: &str, _value: &str) -> Result<()> {
            anyhow::bail!("disk full")
        }

        async fn delete(&self, _name: &str) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn test_corrupt_slot_with_failing_copy_still_loads() {
        let slots = Arc::new(ReadOnlySlots {
            inner: MemorySlots::with_value(ATTENDEES_SLOT, "{not json"),
        });
        let store = ProfileStore::load(slots).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_collection_unchanged() {
        let stored = r#"[{"id": "a1", "name": "Alice", "url": "u1"}]"#;
        let slots = Arc::new(ReadOnlySlots {
            inner: MemorySlots::with_value(ATTENDEES_SLOT, stored),
        });
        let mut store = ProfileStore::load(slots).await.unwrap();
        let before = store.profiles().to_vec();

        assert!(store.add(profile("Bob", "u2")).await.is_err());
        assert!(store.remove(&ProfileId::from("a1")).await.is_err());
        assert!(store
            .import_merge(vec![profile("Cy", "u3")])
            .await
            .is_err());
        assert!(store.clear().await.is_err());

        assert_eq!(store.profiles(), before.as_slice());
    }

    #[tokio::test]
    async fn test_schools_distinct_sorted() {
        let mut store = empty_store().await;
        for (i, school) in ["Yale", "Barnard", "Yale", ""].iter().enumerate() {
            let mut p = profile("P", &format!("u{}", i));
            p.school = Some(school.to_string());
            store.add(p).await.unwrap();
        }
        assert_eq!(store.schools(), vec!["Barnard", "Yale"]);
        assert_eq!(store.stats().schools, 2);
    }

    #[test]
    fn test_parse_import_requires_array() {
        assert!(matches!(
            parse_import(r#"{"name": "A"}"#),
            Err(ImportError::NotAnArray)
        ));
        assert!(matches!(parse_import("nope"), Err(ImportError::Json(_))));
        assert_eq!(parse_import("[]").unwrap().len(), 0);
    }

    #[test]
    fn test_profile_input_overrides() {
        let p = parse_profile_input(
            r#"{"name": "A", "school": "Old", "image": "keep.png"}"#,
            Some("New School"),
            Some("other.png"),
        )
        .unwrap();
        assert_eq!(p.school.as_deref(), Some("New School"));
        assert_eq!(p.image.as_deref(), Some("keep.png"));

        let p = parse_profile_input(r#"{"name": "A"}"#, Some("  "), Some("img.png")).unwrap();
        assert_eq!(p.school, None);
        assert_eq!(p.image.as_deref(), Some("img.png"));

        assert!(matches!(
            parse_profile_input("[1]", None, None),
            Err(ImportError::NotAnObject)
        ));
    }
}
