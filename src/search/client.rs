//! Transport to the ranking proxy.
//!
//! The proxy wraps the model's reply in a message envelope:
//!
//! ```json
//! { "content": [ { "type": "thinking", "thinking": "..." },
//!                { "type": "text", "text": "{\"summary\": ...}" } ] }
//! ```
//!
//! Errors come back as a non-2xx status with `{ "error": ..., "details": ... }`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::SearchError;

/// JSON body posted to the ranking endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchRequest {
    /// Full-corpus ranking; `attendees` is the pretty-printed collection.
    Corpus {
        model: String,
        query: String,
        attendees: String,
        #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
    /// Index-backed ranking; the service owns the corpus.
    Index {
        /// Analysis model the index service runs over its candidates.
        model: String,
        query: String,
        match_count: usize,
        #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
}

impl SearchRequest {
    pub fn query(&self) -> &str {
        match self {
            SearchRequest::Corpus { query, .. } | SearchRequest::Index { query, .. } => query,
        }
    }
}

/// Sends a [`SearchRequest`] and returns the model's textual answer.
#[async_trait]
pub trait RankingClient: Send + Sync {
    async fn rank(&self, endpoint: &str, request: &SearchRequest) -> Result<String, SearchError>;
}

/// [`RankingClient`] over HTTP. No retry: a failure is reported as-is.
pub struct HttpRankingClient {
    client: reqwest::Client,
}

impl HttpRankingClient {
    pub fn new(timeout_secs: u64) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RankingClient for HttpRankingClient {
    async fn rank(&self, endpoint: &str, request: &SearchRequest) -> Result<String, SearchError> {
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SearchError::Remote {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        let envelope: Value =
            serde_json::from_str(&body).map_err(|_| SearchError::MalformedEnvelope)?;
        let text = answer_text(&envelope)?;
        debug!(chars = text.len(), "ranking answer received");
        Ok(text)
    }
}

/// `details`, then `error`, then the status reason.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::String(_) | Value::Null => None,
                other => Some(other.to_string()),
            })
    };
    field("details")
        .or_else(|| field("error"))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

/// Pick the `text` block out of the envelope, falling back to the first
/// block.
pub fn answer_text(envelope: &Value) -> Result<String, SearchError> {
    let blocks = envelope
        .get("content")
        .and_then(Value::as_array)
        .filter(|b| !b.is_empty())
        .ok_or(SearchError::MalformedEnvelope)?;

    let block = blocks
        .iter()
        .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .unwrap_or(&blocks[0]);

    block
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(SearchError::MalformedEnvelope)
}
