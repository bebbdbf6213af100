use thiserror::Error;

use crate::types::{CompetitorId, MatchId};

pub type Result<T> = std::result::Result<T, BracketError>;

/// Errors surfaced by the competitor registry and the bracket engine.
///
/// Every variant is recoverable; the caller decides whether to re-prompt,
/// report, or abort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BracketError {
    /// Malformed competitor data at registration.
    #[error("Invalid entry: {reason}")]
    InvalidEntry { reason: String },

    /// The source reference is already registered.
    #[error("Duplicate entry: {source_ref} is already registered")]
    DuplicateEntry { source_ref: String },

    #[error("At least two entrants are required (got {count})")]
    InsufficientEntrants { count: usize },

    /// Result submitted for a match that is not currently active.
    #[error("Match {match_id} is not the active match")]
    UnknownMatch { match_id: MatchId },

    #[error("Competitor {winner} is not a participant of match {match_id}")]
    InvalidWinner { match_id: MatchId, winner: CompetitorId },

    /// The match already has a different winner recorded.
    #[error("Match {match_id} already has a different winner")]
    ResultConflict { match_id: MatchId },

    #[error("Tournament is not complete")]
    NotComplete,

    /// Internal consistency failure. Indicates a construction bug.
    #[error("Bracket invariant violated: {0}")]
    BracketInvariantViolation(String),
}

impl BracketError {
    pub(crate) fn invalid_entry(reason: impl Into<String>) -> Self {
        BracketError::InvalidEntry { reason: reason.into() }
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        BracketError::BracketInvariantViolation(msg.into())
    }
}
