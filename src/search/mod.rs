//! Natural-language search delegated to a remote ranking model.
//!
//! The local store does no ranking of its own. A search serializes the
//! collection (or, for the index-backed `vector` model, only the query),
//! posts it to the ranking proxy and turns the model's answer into an
//! ordered list of matches:
//!
//! 1. The answer text is parsed as JSON, or failing that the span from the
//!    first `{` to the last `}` is tried. If neither parses, the raw text is
//!    returned as [`SearchOutcome::Unparsed`].
//! 2. Match ids are resolved against the snapshot that was sent; unknown ids
//!    are dropped.
//! 3. A missing or non-numeric score counts as 0.
//! 4. Matches scoring below `search.min_score` are dropped.
//! 5. The rest are stably sorted by descending score, so ties keep the
//!    model's order.
//!
//! Concurrent searches are reconciled by [`SearchSession`].

pub mod client;
pub mod command;
pub mod model;
pub mod session;

pub use client::{HttpRankingClient, RankingClient, SearchRequest};
pub use command::{run_model, run_search, OutputFormat};
pub use model::{Provider, RankingModel};
pub use session::{Completion, SearchPhase, SearchSession, SearchTicket};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SearchConfig;
use crate::models::{AttendeeProfile, Highlight, ProfileId, SearchMatch};
use crate::store::ProfileStore;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Please enter a search query")]
    EmptyQuery,

    #[error("No attendees in database yet")]
    NothingToSearch,

    #[error("Please configure your {provider} API key ({env})")]
    MissingApiKey {
        provider: &'static str,
        env: &'static str,
    },

    #[error("{0}")]
    Transport(String),

    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("ranking service returned an unexpected response")]
    MalformedEnvelope,
}

impl SearchError {
    /// Text for the status line.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::Transport(_)
            | SearchError::Remote { .. }
            | SearchError::MalformedEnvelope => {
                format!("Error: {}. Please check your API key and try again.", self)
            }
            _ => self.to_string(),
        }
    }
}

/// A match resolved against the local snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub profile: AttendeeProfile,
    #[serde(rename = "match")]
    pub matched: SearchMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchOutcome {
    Ranked {
        summary_text: String,
        /// Non-increasing by score.
        matches: Vec<RankedMatch>,
        dropped_below_floor: usize,
        show_clear: bool,
    },
    /// The answer contained no parseable JSON.
    Unparsed { raw: String },
}

/// The stored model preference, or `search.default_model` when none is
/// stored or the stored value is no longer recognised.
pub async fn selected_model(store: &ProfileStore, config: &SearchConfig) -> anyhow::Result<RankingModel> {
    if let Some(stored) = store.selected_model().await? {
        match stored.parse() {
            Ok(model) => return Ok(model),
            Err(_) => warn!(model = %stored, "ignoring unknown stored model"),
        }
    }
    config.default_model.parse()
}

/// Run one search against `profiles`.
pub async fn search(
    client: &dyn RankingClient,
    config: &SearchConfig,
    model: RankingModel,
    query: &str,
    profiles: &[AttendeeProfile],
) -> Result<SearchOutcome, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    if model.requires_corpus() && profiles.is_empty() {
        return Err(SearchError::NothingToSearch);
    }

    let api_key = match model.provider() {
        Some(provider) => {
            let key = provider.api_key();
            if key.is_none() && config.require_api_key {
                return Err(SearchError::MissingApiKey {
                    provider: provider.name(),
                    env: provider.api_key_env(),
                });
            }
            key
        }
        None => None,
    };

    let (endpoint, request) = if model.requires_corpus() {
        let attendees = serde_json::to_string_pretty(profiles)
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        (
            config.endpoint.as_str(),
            SearchRequest::Corpus {
                model: model.as_str().to_string(),
                query: query.to_string(),
                attendees,
                api_key,
            },
        )
    } else {
        (
            config
                .index_endpoint
                .as_deref()
                .unwrap_or(config.endpoint.as_str()),
            SearchRequest::Index {
                model: config.index_analysis_model.clone(),
                query: query.to_string(),
                match_count: config.match_count,
                api_key,
            },
        )
    };

    info!(model = %model, profiles = profiles.len(), "searching");
    let answer = client.rank(endpoint, &request).await?;
    Ok(interpret_answer(&answer, profiles, config.min_score))
}

/// Parse the model's answer and rank its matches.
pub fn interpret_answer(answer: &str, profiles: &[AttendeeProfile], min_score: f64) -> SearchOutcome {
    let Some(parsed) = extract_json(answer) else {
        warn!("ranking answer contained no JSON object");
        return SearchOutcome::Unparsed {
            raw: answer.to_string(),
        };
    };

    let summary = parsed
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let raw_matches = parsed
        .get("matches")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    if raw_matches.is_empty() {
        return SearchOutcome::Ranked {
            summary_text: summary
                .unwrap_or("No matches found for your query.")
                .to_string(),
            matches: Vec::new(),
            dropped_below_floor: 0,
            show_clear: true,
        };
    }

    let resolved: Vec<RankedMatch> = raw_matches
        .iter()
        .filter_map(|m| resolve_match(m, profiles))
        .collect();
    let (mut kept, dropped): (Vec<_>, Vec<_>) = resolved
        .into_iter()
        .partition(|m| m.matched.score >= min_score);
    if !dropped.is_empty() {
        info!(
            dropped = dropped.len(),
            min_score, "filtered matches below score threshold"
        );
    }
    kept.sort_by(|a, b| b.matched.score.total_cmp(&a.matched.score));

    let summary_text = if kept.is_empty() {
        format!(
            "{}\n\nAll matches had scores below the minimum threshold of {}.",
            summary.unwrap_or("No high-quality matches found for your query."),
            min_score
        )
    } else {
        summary.unwrap_or("Found matching attendees").to_string()
    };

    SearchOutcome::Ranked {
        summary_text,
        matches: kept,
        dropped_below_floor: dropped.len(),
        show_clear: true,
    }
}

/// Whole text as a JSON object, else the first-`{`-to-last-`}` span.
fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn resolve_match(raw: &Value, profiles: &[AttendeeProfile]) -> Option<RankedMatch> {
    let id = raw.get("id").and_then(ProfileId::from_json)?;
    let Some(profile) = profiles.iter().find(|p| p.has_id(&id)) else {
        warn!(id = %id, "ranking answer referenced unknown attendee");
        return None;
    };

    let score = match raw.get("score").and_then(score_value) {
        Some(s) if s != 0.0 => s,
        _ => {
            warn!(id = %id, "match has no score, treating as 0");
            0.0
        }
    };

    let relevance = raw
        .get("relevance")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let highlights = raw
        .get("highlights")
        .and_then(Value::as_array)
        .map(|hs| {
            hs.iter()
                .filter_map(|h| serde_json::from_value::<Highlight>(h.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Some(RankedMatch {
        profile: profile.clone(),
        matched: SearchMatch {
            id,
            score,
            relevance,
            highlights,
        },
    })
}

fn score_value(value: &Value) -> Option<f64> {
    let score: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    score.filter(|s| s.is_finite())
}
