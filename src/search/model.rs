//! Ranking model identifiers.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;

/// A model choice forwarded to the ranking proxy.
///
/// Every model except [`RankingModel::Vector`] ranks the full local corpus,
/// which is serialized into the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingModel {
    GeminiPro,
    GeminiFlash,
    Gemini3Pro,
    Gemini3Flash,
    ClaudeSonnet,
    Gpt4o,
    Gpt4oMini,
    /// Index-backed search; only the query is sent.
    Vector,
}

/// Hosting provider of a model, which decides the API key used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Google,
    OpenAi,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::Google => "Google",
            Provider::OpenAi => "OpenAI",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Google => "GOOGLE_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Non-empty key from the environment, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(self.api_key_env())
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

const ALL: [RankingModel; 8] = [
    RankingModel::GeminiPro,
    RankingModel::GeminiFlash,
    RankingModel::Gemini3Pro,
    RankingModel::Gemini3Flash,
    RankingModel::ClaudeSonnet,
    RankingModel::Gpt4o,
    RankingModel::Gpt4oMini,
    RankingModel::Vector,
];

impl RankingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingModel::GeminiPro => "gemini-pro",
            RankingModel::GeminiFlash => "gemini-flash",
            RankingModel::Gemini3Pro => "gemini-3-pro",
            RankingModel::Gemini3Flash => "gemini-3-flash",
            RankingModel::ClaudeSonnet => "claude-sonnet",
            RankingModel::Gpt4o => "gpt-4o",
            RankingModel::Gpt4oMini => "gpt-4o-mini",
            RankingModel::Vector => "vector",
        }
    }

    pub fn all() -> &'static [RankingModel] {
        &ALL
    }

    pub fn all_ids() -> Vec<&'static str> {
        ALL.iter().map(|m| m.as_str()).collect()
    }

    /// Whether the request carries the whole attendee collection.
    pub fn requires_corpus(&self) -> bool {
        !matches!(self, RankingModel::Vector)
    }

    pub fn provider(&self) -> Option<Provider> {
        match self {
            RankingModel::GeminiPro
            | RankingModel::GeminiFlash
            | RankingModel::Gemini3Pro
            | RankingModel::Gemini3Flash => Some(Provider::Google),
            RankingModel::ClaudeSonnet => Some(Provider::Anthropic),
            RankingModel::Gpt4o | RankingModel::Gpt4oMini => Some(Provider::OpenAi),
            RankingModel::Vector => None,
        }
    }
}

impl fmt::Display for RankingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match ALL.iter().find(|m| m.as_str() == s) {
            Some(m) => Ok(*m),
            None => bail!(
                "Unknown model '{}'. Must be one of: {}",
                s,
                RankingModel::all_ids().join(", ")
            ),
        }
    }
}
