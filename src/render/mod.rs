//! Render projection: profile (+ optional match) → typed view model.
//!
//! [`project`] is pure and produces data only. Markup is produced in one
//! place, [`html`], which escapes every text node; [`text`] renders the same
//! view model for the terminal.
//!
//! # Match overlay
//!
//! Highlights from the ranking service are keyed as `section:index:field`
//! (field defaulting to `all`), or by bare section for singular fields such
//! as the headline. A repeated item shows at most one badge; when several
//! fields of the same item are highlighted, the first in the section's
//! priority list wins:
//!
//! | Section | Priority |
//! |---------|----------|
//! | experience | title, company, description, all |
//! | education | school, degree, all |
//! | organizations | name, role, all |
//! | volunteering | role, organization, all |
//! | projects | name, role, description, all |
//! | awards | name, description, all |
//! | skills, languages, interests | all |

pub mod html;
pub mod text;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::config::RenderConfig;
use crate::models::{AttendeeProfile, Highlight, ProfileId, SearchMatch, Section};

const SCORE_RING_RADIUS: f64 = 34.0;

/// Render tunables, usually built from [`RenderConfig`].
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub experience_preview: usize,
    pub skills_preview: usize,
    pub badge_popup_threshold: usize,
    pub score_high: f64,
    pub score_medium: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for RenderSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            experience_preview: config.experience_preview,
            skills_preview: config.skills_preview,
            badge_popup_threshold: config.badge_popup_threshold,
            score_high: config.score_high,
            score_medium: config.score_medium,
        }
    }
}

/// View-local "show more" state. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    open: HashSet<(ProfileId, Section)>,
}

impl Expansion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the section open/closed; returns the new state.
    pub fn toggle(&mut self, id: &ProfileId, section: Section) -> bool {
        let key = (id.clone(), section);
        if self.open.remove(&key) {
            false
        } else {
            self.open.insert(key);
            true
        }
    }

    pub fn is_expanded(&self, id: &ProfileId, section: Section) -> bool {
        self.open.contains(&(id.clone(), section))
    }
}

/// Marker used by callers that want every section fully expanded.
#[derive(Debug, Clone, Copy)]
pub struct ExpandAll;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBucket {
    High,
    Medium,
    Low,
}

impl ScoreBucket {
    pub fn css_class(&self) -> &'static str {
        match self {
            ScoreBucket::High => "score-high",
            ScoreBucket::Medium => "score-medium",
            ScoreBucket::Low => "score-low",
        }
    }
}

pub fn score_bucket(score: f64, settings: &RenderSettings) -> ScoreBucket {
    if score >= settings.score_high {
        ScoreBucket::High
    } else if score >= settings.score_medium {
        ScoreBucket::Medium
    } else {
        ScoreBucket::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreView {
    pub score: f64,
    pub bucket: ScoreBucket,
    pub ring_circumference: f64,
    /// Stroke offset that leaves `score`% of the ring drawn.
    pub ring_dash_offset: f64,
}

impl ScoreView {
    fn new(score: f64, settings: &RenderSettings) -> Self {
        let circumference = 2.0 * std::f64::consts::PI * SCORE_RING_RADIUS;
        let progress = (score.clamp(0.0, 100.0) / 100.0) * circumference;
        Self {
            score,
            bucket: score_bucket(score, settings),
            ring_circumference: circumference,
            ring_dash_offset: circumference - progress,
        }
    }
}

/// Relevance text, split into a leading descriptor such as `"Strong match:"`
/// when one is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceView {
    pub descriptor: Option<String>,
    pub text: String,
}

impl RelevanceView {
    pub fn parse(relevance: &str) -> Option<Self> {
        let relevance = relevance.trim();
        if relevance.is_empty() {
            return None;
        }
        match relevance.find(':') {
            Some(pos) if pos > 0 => Some(Self {
                descriptor: Some(relevance[..=pos].to_string()),
                text: relevance[pos + 1..].trim().to_string(),
            }),
            _ => Some(Self {
                descriptor: None,
                text: relevance.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeDisplay {
    /// Long reason, shown as an expandable popup.
    Popup,
    /// Short reason, shown as a hover tooltip.
    Tooltip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchBadge {
    pub field: String,
    pub reason: String,
    pub display: BadgeDisplay,
}

impl MatchBadge {
    fn new(field: &str, reason: &str, settings: &RenderSettings) -> Self {
        let display = if reason.chars().count() > settings.badge_popup_threshold {
            BadgeDisplay::Popup
        } else {
            BadgeDisplay::Tooltip
        };
        Self {
            field: field.to_string(),
            reason: reason.to_string(),
            display,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLayout {
    /// One block per entry.
    List,
    /// Inline tags.
    Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub index: usize,
    pub primary: String,
    pub secondary: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub badge: Option<MatchBadge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub section: Section,
    pub title: &'static str,
    pub layout: SectionLayout,
    pub items: Vec<ItemView>,
    /// Number of items shown while collapsed; `None` means no truncation.
    pub preview: Option<usize>,
    pub expanded: bool,
}

impl SectionView {
    /// Items currently visible given the expansion state.
    pub fn visible(&self) -> &[ItemView] {
        match self.preview {
            Some(n) if !self.expanded => &self.items[..n.min(self.items.len())],
            _ => &self.items,
        }
    }

    /// Items hidden behind "show more" while collapsed.
    pub fn hidden_count(&self) -> usize {
        match self.preview {
            Some(n) => self.items.len().saturating_sub(n),
            None => 0,
        }
    }

    pub fn is_expandable(&self) -> bool {
        self.hidden_count() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub value: String,
    pub badge: Option<MatchBadge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub id: Option<ProfileId>,
    pub name: String,
    pub headline: Option<FieldView>,
    pub location: Option<FieldView>,
    pub school: Option<FieldView>,
    pub about: Option<FieldView>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub score: Option<ScoreView>,
    pub relevance: Option<RelevanceView>,
    pub sections: Vec<SectionView>,
}

impl ProfileView {
    pub fn section(&self, section: Section) -> Option<&SectionView> {
        self.sections.iter().find(|s| s.section == section)
    }

    /// Badges across the whole card.
    pub fn badge_count(&self) -> usize {
        let singular = [&self.headline, &self.location, &self.school, &self.about]
            .into_iter()
            .flatten()
            .filter(|f| f.badge.is_some())
            .count();
        let items: usize = self
            .sections
            .iter()
            .map(|s| s.items.iter().filter(|i| i.badge.is_some()).count())
            .sum();
        singular + items
    }
}

/// Highlight lookup keyed like the ranking service's references.
#[derive(Debug, Default)]
struct HighlightIndex<'a> {
    items: HashMap<(Section, usize, String), &'a str>,
    singular: HashMap<Section, &'a str>,
}

impl<'a> HighlightIndex<'a> {
    fn build(highlights: &'a [Highlight]) -> Self {
        let mut index = Self::default();
        for h in highlights.iter().filter(|h| !h.reason.is_empty()) {
            let Some(section) = Section::parse(&h.section) else {
                debug!(section = %h.section, "ignoring highlight for unknown section");
                continue;
            };
            match h.index {
                Some(i) => {
                    let field = h
                        .field
                        .as_deref()
                        .map(|f| f.trim().to_ascii_lowercase())
                        .filter(|f| !f.is_empty())
                        .unwrap_or_else(|| "all".to_string());
                    index.items.insert((section, i, field), h.reason.as_str());
                }
                None => {
                    index.singular.insert(section, h.reason.as_str());
                }
            }
        }
        index
    }

    /// First highlighted field by priority, with its reason.
    fn item(&self, section: Section, i: usize, priority: &[&'static str]) -> Option<(&'static str, &'a str)> {
        priority.iter().find_map(|field| {
            self.items
                .get(&(section, i, field.to_string()))
                .map(|reason| (*field, *reason))
        })
    }

    fn singular(&self, section: Section) -> Option<&'a str> {
        self.singular.get(&section).copied()
    }

    /// Whether any highlight in `section` points into `range`.
    fn any_in(&self, section: Section, range: std::ops::Range<usize>) -> bool {
        self.items
            .keys()
            .any(|(s, i, _)| *s == section && range.contains(i))
    }
}

fn field_priority(section: Section) -> &'static [&'static str] {
    match section {
        Section::Experience => &["title", "company", "description", "all"],
        Section::Education => &["school", "degree", "all"],
        Section::Organizations => &["name", "role", "all"],
        Section::Volunteering => &["role", "organization", "all"],
        Section::Projects => &["name", "role", "description", "all"],
        Section::Awards => &["name", "description", "all"],
        _ => &["all"],
    }
}

/// Something that can say whether a section starts expanded.
pub trait ExpansionState {
    fn is_open(&self, id: Option<&ProfileId>, section: Section) -> bool;
}

impl ExpansionState for Expansion {
    fn is_open(&self, id: Option<&ProfileId>, section: Section) -> bool {
        id.is_some_and(|id| self.is_expanded(id, section))
    }
}

impl ExpansionState for ExpandAll {
    fn is_open(&self, _id: Option<&ProfileId>, _section: Section) -> bool {
        true
    }
}

/// Build the view model for one profile.
///
/// With a match, the score, relevance and badges are overlaid, and any
/// previewed section with a highlight beyond its preview starts expanded.
pub fn project(
    profile: &AttendeeProfile,
    matched: Option<&SearchMatch>,
    expansion: &dyn ExpansionState,
    settings: &RenderSettings,
) -> ProfileView {
    let highlights = matched.map(|m| m.highlights.as_slice()).unwrap_or(&[]);
    let index = HighlightIndex::build(highlights);
    let id = profile.id.as_ref();

    let singular = |section: Section, value: Option<&str>| -> Option<FieldView> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        Some(FieldView {
            value: value.to_string(),
            badge: index
                .singular(section)
                .map(|reason| MatchBadge::new("all", reason, settings)),
        })
    };

    let mut headline = singular(Section::Headline, profile.headline.as_deref());
    let school = singular(Section::School, profile.school.as_deref());
    // One badge for the header block: the school wins over the headline.
    if school.as_ref().is_some_and(|s| s.badge.is_some()) {
        if let Some(h) = headline.as_mut() {
            h.badge = None;
        }
    }

    let mut sections = Vec::new();
    let mut push = |section: Section,
                    layout: SectionLayout,
                    preview: Option<usize>,
                    entries: Vec<Entry>| {
        if entries.is_empty() {
            return;
        }
        let priority = field_priority(section);
        let items: Vec<ItemView> = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| ItemView {
                index: i,
                primary: e.primary,
                secondary: e.secondary,
                duration: e.duration,
                description: e.description,
                badge: index
                    .item(section, i, priority)
                    .map(|(field, reason)| MatchBadge::new(field, reason, settings)),
            })
            .collect();
        let highlighted_past_preview =
            preview.is_some_and(|n| index.any_in(section, n..items.len()));
        sections.push(SectionView {
            section,
            title: section.title(),
            layout,
            expanded: expansion.is_open(id, section) || highlighted_past_preview,
            items,
            preview,
        });
    };

    push(
        Section::Experience,
        SectionLayout::List,
        Some(settings.experience_preview),
        profile
            .experience
            .iter()
            .map(|e| Entry::new(&e.title, &e.company, &e.duration, &e.description))
            .collect(),
    );
    push(
        Section::Education,
        SectionLayout::List,
        None,
        profile
            .education
            .iter()
            .map(|e| Entry::new(&e.school, &e.degree, &e.duration, &None))
            .collect(),
    );
    push(
        Section::Organizations,
        SectionLayout::List,
        None,
        profile
            .organizations
            .iter()
            .map(|o| Entry::new(&o.name, &o.role, &o.duration, &None))
            .collect(),
    );
    push(
        Section::Volunteering,
        SectionLayout::List,
        None,
        profile
            .volunteering
            .iter()
            .map(|v| Entry::new(&v.role, &v.organization, &v.duration, &None))
            .collect(),
    );
    push(
        Section::Projects,
        SectionLayout::List,
        None,
        profile
            .projects
            .iter()
            .map(|p| Entry::new(&p.name, &p.role, &p.duration, &p.description))
            .collect(),
    );
    push(
        Section::Awards,
        SectionLayout::List,
        None,
        profile
            .awards
            .iter()
            .map(|a| Entry::new(&a.name, &None, &a.date, &a.description))
            .collect(),
    );
    push(
        Section::Skills,
        SectionLayout::Tags,
        Some(settings.skills_preview),
        profile.skills.iter().map(|s| Entry::tag(s)).collect(),
    );
    push(
        Section::Languages,
        SectionLayout::Tags,
        None,
        profile.languages.iter().map(|s| Entry::tag(s)).collect(),
    );
    push(
        Section::Interests,
        SectionLayout::Tags,
        None,
        profile.interests.iter().map(|s| Entry::tag(s)).collect(),
    );

    ProfileView {
        id: profile.id.clone(),
        name: profile.display_name().to_string(),
        headline,
        location: singular(Section::Location, profile.location.as_deref()),
        school,
        about: singular(Section::About, profile.about.as_ref().map(|a| a.text())),
        image: profile.image.clone().filter(|s| !s.is_empty()),
        url: profile.url.clone().filter(|s| !s.is_empty()),
        score: matched.map(|m| ScoreView::new(m.score, settings)),
        relevance: matched.and_then(|m| RelevanceView::parse(&m.relevance)),
        sections,
    }
}

struct Entry {
    primary: String,
    secondary: Option<String>,
    duration: Option<String>,
    description: Option<String>,
}

impl Entry {
    fn new(
        primary: &Option<String>,
        secondary: &Option<String>,
        duration: &Option<String>,
        description: &Option<String>,
    ) -> Self {
        let clean = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        Self {
            primary: clean(primary).unwrap_or_default(),
            secondary: clean(secondary),
            duration: clean(duration),
            description: clean(description),
        }
    }

    fn tag(value: &str) -> Self {
        Self {
            primary: value.to_string(),
            secondary: None,
            duration: None,
            description: None,
        }
    }
}
