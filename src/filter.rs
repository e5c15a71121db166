//! Listing filter and sort.
//!
//! A pure function of the collection and the three list controls. It is
//! recomputed from scratch on every call; collections are expected to stay in
//! the low thousands.

use serde::Deserialize;
use std::cmp::Ordering;

use crate::models::AttendeeProfile;

/// Sort order for the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    School,
    /// Most recently added first.
    Recent,
    /// Stored order.
    Insertion,
}

impl SortKey {
    /// Unknown keys fall back to stored order rather than erroring.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "name" => SortKey::Name,
            "school" => SortKey::School,
            "recent" => SortKey::Recent,
            _ => SortKey::Insertion,
        }
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SortKey::parse(&s))
    }
}

/// The three list controls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Free-text filter; empty matches everything.
    #[serde(default, alias = "q")]
    pub text: String,
    /// Exact school; empty matches everything.
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub sort: SortKey,
}

/// Apply text and school filters, then sort. The sort is stable.
pub fn filter_profiles<'a>(
    profiles: &'a [AttendeeProfile],
    query: &ListQuery,
) -> Vec<&'a AttendeeProfile> {
    let needle = query.text.to_lowercase();

    let mut selected: Vec<&AttendeeProfile> = profiles
        .iter()
        .filter(|p| matches_text(p, &needle) && matches_school(p, &query.school))
        .collect();

    match query.sort {
        SortKey::Name => selected.sort_by(|a, b| {
            locale_cmp(a.name.as_deref().unwrap_or(""), b.name.as_deref().unwrap_or(""))
        }),
        SortKey::School => selected.sort_by(|a, b| {
            locale_cmp(
                a.school.as_deref().unwrap_or(""),
                b.school.as_deref().unwrap_or(""),
            )
        }),
        SortKey::Recent => selected.sort_by(|a, b| match (a.added_at, b.added_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortKey::Insertion => {}
    }

    selected
}

/// Whether `needle` (already lowercased) occurs in any searchable field.
pub fn matches_text(profile: &AttendeeProfile, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let hit = |field: Option<&str>| field.is_some_and(|s| s.to_lowercase().contains(needle));

    hit(profile.name.as_deref())
        || hit(profile.headline.as_deref())
        || hit(profile.school.as_deref())
        || profile
            .experience
            .iter()
            .any(|e| hit(e.company.as_deref()) || hit(e.title.as_deref()))
}

fn matches_school(profile: &AttendeeProfile, school: &str) -> bool {
    school.is_empty() || profile.school.as_deref() == Some(school)
}

/// Case-insensitive comparison with a case-sensitive tie-break, so
/// "alice" and "Alice" sort next to each other ahead of "Bob".
fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
