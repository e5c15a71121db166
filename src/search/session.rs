//! Search lifecycle with a stale-response guard.
//!
//! Each search takes a [`SearchTicket`] from [`SearchSession::begin`]. A
//! result is applied only if its ticket is still the latest one issued, so a
//! slow response can never overwrite the results of a newer query.

use serde::Serialize;
use tracing::debug;

use super::{SearchError, SearchOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SearchTicket(u64);

#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SearchPhase {
    #[default]
    Idle,
    Querying {
        query: String,
    },
    Success {
        outcome: SearchOutcome,
    },
    /// The answer had no usable JSON; `raw` is shown as-is.
    ParseError {
        raw: String,
    },
    TransportError {
        message: String,
    },
}

impl SearchPhase {
    fn from_result(result: Result<SearchOutcome, SearchError>) -> Self {
        match result {
            Ok(SearchOutcome::Unparsed { raw }) => SearchPhase::ParseError { raw },
            Ok(outcome) => SearchPhase::Success { outcome },
            Err(e) => SearchPhase::TransportError {
                message: e.user_message(),
            },
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, SearchPhase::Querying { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// A newer search was started, or results were cleared, after this
    /// ticket was issued.
    Stale,
}

#[derive(Debug, Default)]
pub struct SearchSession {
    issued: u64,
    /// Ticket whose result may still be applied.
    current: Option<SearchTicket>,
    phase: SearchPhase,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SearchPhase {
        &self.phase
    }

    pub fn begin(&mut self, query: &str) -> SearchTicket {
        self.issued += 1;
        let ticket = SearchTicket(self.issued);
        self.current = Some(ticket);
        self.phase = SearchPhase::Querying {
            query: query.to_string(),
        };
        ticket
    }

    pub fn complete(
        &mut self,
        ticket: SearchTicket,
        result: Result<SearchOutcome, SearchError>,
    ) -> Completion {
        if self.current != Some(ticket) {
            debug!(ticket = ticket.0, "discarding stale search result");
            return Completion::Stale;
        }
        self.current = None;
        self.phase = SearchPhase::from_result(result);
        Completion::Applied
    }

    /// Back to idle; any in-flight search becomes stale.
    pub fn clear(&mut self) {
        self.current = None;
        self.phase = SearchPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(summary: &str) -> SearchOutcome {
        SearchOutcome::Ranked {
            summary_text: summary.to_string(),
            matches: Vec::new(),
            dropped_below_floor: 0,
            show_clear: true,
        }
    }

    fn summary(session: &SearchSession) -> Option<&str> {
        match session.phase() {
            SearchPhase::Success {
                outcome: SearchOutcome::Ranked { summary_text, .. },
            } => Some(summary_text),
            _ => None,
        }
    }

    #[test]
    fn test_older_response_is_discarded() {
        let mut session = SearchSession::new();
        let first = session.begin("rust");
        let second = session.begin("python");

        assert_eq!(session.complete(second, Ok(ranked("python results"))), Completion::Applied);
        assert_eq!(session.complete(first, Ok(ranked("rust results"))), Completion::Stale);
        assert_eq!(summary(&session), Some("python results"));
    }

    #[test]
    fn test_clear_invalidates_in_flight() {
        let mut session = SearchSession::new();
        let ticket = session.begin("rust");
        assert!(session.phase().is_busy());
        session.clear();
        assert_eq!(session.complete(ticket, Ok(ranked("late"))), Completion::Stale);
        assert!(matches!(session.phase(), SearchPhase::Idle));
    }

    #[test]
    fn test_phases_follow_result() {
        let mut session = SearchSession::new();
        let t = session.begin("q");
        session.complete(
            t,
            Ok(SearchOutcome::Unparsed {
                raw: "sorry".into(),
            }),
        );
        assert!(matches!(session.phase(), SearchPhase::ParseError { raw } if raw == "sorry"));

        let t = session.begin("q");
        session.complete(
            t,
            Err(SearchError::Remote {
                status: 500,
                message: "bad key".into(),
            }),
        );
        match session.phase() {
            SearchPhase::TransportError { message } => {
                assert!(message.starts_with("Error: bad key"));
            }
            other => panic!("unexpected phase {:?}", other),
        }
    }

    #[test]
    fn test_ticket_applies_once() {
        let mut session = SearchSession::new();
        let t = session.begin("q");
        assert_eq!(session.complete(t, Ok(ranked("a"))), Completion::Applied);
        assert_eq!(session.complete(t, Ok(ranked("b"))), Completion::Stale);
        assert_eq!(summary(&session), Some("a"));
    }
}
