use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::bracket::Bracket;
use crate::registry::CompetitorRegistry;

// ── Constants ──────────────────────────────────────────────────────────

pub const BYE_LABEL: &str = "BYE";
pub const PENDING_LABEL: &str = "TBD";
pub const DEFAULT_ALLOWED_EXTENSION: &str = "mp3";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "song-bracket.log";
pub const RESULTS_LOG_FILE_NAME: &str = "results.log";

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedTournament = Arc<Mutex<TournamentState>>;

// ── Competitors ────────────────────────────────────────────────────────

/// Stable arena index of a competitor inside one bracket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitorId(pub u32);

impl fmt::Display for CompetitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A validated registration: display name plus an opaque asset reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    pub source_ref: String,
}

impl Entry {
    pub fn new(name: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Entry {
            name: name.into(),
            source_ref: source_ref.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub id: CompetitorId,
    pub name: String,
    pub source_ref: String,
}

/// One side of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Competitor(CompetitorId),
    /// Padding slot with no real entrant.
    Bye,
    /// Feeder match not resolved yet.
    Pending,
}

impl Slot {
    pub fn competitor_id(self) -> Option<CompetitorId> {
        match self {
            Slot::Competitor(id) => Some(id),
            Slot::Bye | Slot::Pending => None,
        }
    }

    pub fn is_bye(self) -> bool {
        matches!(self, Slot::Bye)
    }
}

// ── Matches ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(pub u32);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Position of the next match awaiting a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub round_index: usize,
    pub match_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AdvanceResult {
    NextMatch { match_id: MatchId, cursor: Cursor },
    TournamentComplete { champion: CompetitorId },
}

impl AdvanceResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, AdvanceResult::TournamentComplete { .. })
    }
}

/// Which side of the active match a vote picks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteSlot {
    A,
    B,
}

// ── Views ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    /// "competitor", "bye" or "pending"
    pub kind: String,
    pub competitor_id: Option<CompetitorId>,
    pub name: String,
    pub source_ref: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub id: Option<MatchId>,
    pub index: usize,
    /// "pending", "active", "completed" or "skipped"
    pub state: String,
    pub slot_a: SlotView,
    pub slot_b: SlotView,
    pub winner_name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub index: usize,
    pub label: String,
    /// False for rounds projected from the bracket size but not built yet.
    pub generated: bool,
    pub matches: Vec<MatchView>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketState {
    pub entrant_count: usize,
    pub bracket_size: usize,
    pub round_count: usize,
    pub rounds: Vec<RoundView>,
    pub cursor: Option<Cursor>,
    pub current_match_id: Option<MatchId>,
    pub is_complete: bool,
    pub champion: Option<Competitor>,
}

/// The active match as presented to a voter.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchUp {
    pub match_id: MatchId,
    pub round_index: usize,
    pub round_label: String,
    pub competitor_a: Competitor,
    pub competitor_b: Competitor,
}

// ── App config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Accepted source extensions, case-insensitive. Empty accepts anything.
    pub allowed_extensions: Vec<String>,
    pub logs_dir: String,
    pub results_log: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec![DEFAULT_ALLOWED_EXTENSION.to_string()],
            logs_dir: "logs".to_string(),
            results_log: true,
        }
    }
}

// ── Tournament session ─────────────────────────────────────────────────

/// Everything the UI layer owns for one tournament. Guarded by a single
/// mutex in [`SharedTournament`]; the bracket itself does no locking.
pub struct TournamentState {
    pub config: AppConfig,
    pub registry: CompetitorRegistry,
    pub bracket: Option<Bracket>,
    pub started_at: Option<DateTime<Local>>,
    pub completed_at: Option<DateTime<Local>>,
}

impl TournamentState {
    pub fn new(config: AppConfig) -> Self {
        let registry = CompetitorRegistry::for_config(&config);
        TournamentState {
            config,
            registry,
            bracket: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn shared(config: AppConfig) -> SharedTournament {
        Arc::new(Mutex::new(TournamentState::new(config)))
    }
}

impl Default for TournamentState {
    fn default() -> Self {
        TournamentState::new(AppConfig::default())
    }
}
