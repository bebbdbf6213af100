use crate::bracket::Bracket;
use crate::config::append_results_log;
use crate::types::*;
use chrono::Local;
use std::path::Path;
use tracing::info;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Lock the mutex, then call `f` with the session state.
fn with_state<F, R>(state: &SharedTournament, f: F) -> Result<R, String>
where
    F: FnOnce(&mut TournamentState) -> Result<R, String>,
{
    let mut guard = state.lock().map_err(|e| e.to_string())?;
    f(&mut guard)
}

/// Lock the mutex and call `f` with the running bracket.
fn with_bracket<F, R>(state: &SharedTournament, f: F) -> Result<R, String>
where
    F: FnOnce(&mut Bracket) -> Result<R, String>,
{
    with_state(state, |guard| {
        let bracket = guard
            .bracket
            .as_mut()
            .ok_or_else(|| "Tournament has not started.".to_string())?;
        f(bracket)
    })
}

fn match_up(bracket: &Bracket) -> Result<Option<MatchUp>, String> {
    let Some(current) = bracket.current_match() else {
        return Ok(None);
    };
    let lookup = |slot: Slot| {
        slot.competitor_id()
            .and_then(|id| bracket.competitor(id))
            .cloned()
            .ok_or_else(|| format!("{} has an unresolved slot.", current.id()))
    };
    Ok(Some(MatchUp {
        match_id: current.id(),
        round_index: current.round_index(),
        round_label: bracket.round_label(current.round_index()),
        competitor_a: lookup(current.slot_a())?,
        competitor_b: lookup(current.slot_b())?,
    }))
}

/// Stamp completion and write the results log once the bracket finishes.
fn finish_if_complete(guard: &mut TournamentState, result: &AdvanceResult) {
    if !result.is_complete() || guard.completed_at.is_some() {
        return;
    }
    guard.completed_at = Some(Local::now());
    if let Some(bracket) = guard.bracket.as_ref() {
        if let Ok(champion) = bracket.champion() {
            info!("Tournament complete, champion: {}", champion.name);
            append_results_log(&guard.config, champion, bracket.entrant_count());
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────────

pub fn tournament_register(name: String, source_ref: String, state: &SharedTournament) -> Result<usize, String> {
    with_state(state, |guard| {
        if guard.bracket.is_some() {
            return Err("Tournament already started; reset it to add songs.".to_string());
        }
        guard.registry.add(&name, &source_ref).map_err(|e| e.to_string())?;
        Ok(guard.registry.count())
    })
}

pub fn tournament_register_path(path: &Path, state: &SharedTournament) -> Result<Entry, String> {
    with_state(state, |guard| {
        if guard.bracket.is_some() {
            return Err("Tournament already started; reset it to add songs.".to_string());
        }
        guard
            .registry
            .add_path(path)
            .cloned()
            .map_err(|e| e.to_string())
    })
}

pub fn tournament_entries(state: &SharedTournament) -> Result<Vec<Entry>, String> {
    with_state(state, |guard| Ok(guard.registry.list().to_vec()))
}

pub fn tournament_start(state: &SharedTournament) -> Result<BracketState, String> {
    with_state(state, |guard| {
        if guard.bracket.as_ref().is_some_and(|b| !b.is_complete()) {
            return Err("Tournament already in progress.".to_string());
        }
        let bracket = Bracket::new(guard.registry.list()).map_err(|e| e.to_string())?;
        let snapshot = bracket.snapshot();
        guard.bracket = Some(bracket);
        guard.started_at = Some(Local::now());
        guard.completed_at = None;
        info!("Tournament started with {} songs", snapshot.entrant_count);
        Ok(snapshot)
    })
}

pub fn tournament_current_match(state: &SharedTournament) -> Result<Option<MatchUp>, String> {
    with_bracket(state, |bracket| match_up(bracket))
}

/// Vote for one side of the active match.
pub fn tournament_vote(pick: VoteSlot, state: &SharedTournament) -> Result<AdvanceResult, String> {
    with_state(state, |guard| {
        let bracket = guard
            .bracket
            .as_mut()
            .ok_or_else(|| "Tournament has not started.".to_string())?;
        let current = bracket
            .current_match()
            .ok_or_else(|| "Tournament is already complete.".to_string())?;
        let slot = match pick {
            VoteSlot::A => current.slot_a(),
            VoteSlot::B => current.slot_b(),
        };
        let match_id = current.id();
        let winner = slot
            .competitor_id()
            .ok_or_else(|| format!("{match_id} has no competitor in slot {pick:?}."))?;
        let result = bracket.record_result(match_id, winner).map_err(|e| e.to_string())?;
        finish_if_complete(guard, &result);
        Ok(result)
    })
}

/// Record a result by explicit match and competitor ids.
pub fn tournament_record(
    match_id: MatchId,
    winner: CompetitorId,
    state: &SharedTournament,
) -> Result<AdvanceResult, String> {
    with_state(state, |guard| {
        let bracket = guard
            .bracket
            .as_mut()
            .ok_or_else(|| "Tournament has not started.".to_string())?;
        let result = bracket.record_result(match_id, winner).map_err(|e| e.to_string())?;
        finish_if_complete(guard, &result);
        Ok(result)
    })
}

pub fn tournament_state(state: &SharedTournament) -> Result<BracketState, String> {
    with_bracket(state, |bracket| Ok(bracket.snapshot()))
}

pub fn tournament_champion(state: &SharedTournament) -> Result<Competitor, String> {
    with_bracket(state, |bracket| bracket.champion().cloned().map_err(|e| e.to_string()))
}

/// Drop the bracket. With `clear_entries` the registered songs go too.
pub fn tournament_reset(clear_entries: bool, state: &SharedTournament) -> Result<(), String> {
    with_state(state, |guard| {
        guard.bracket = None;
        guard.started_at = None;
        guard.completed_at = None;
        if clear_entries {
            guard.registry.clear();
        }
        info!("Tournament reset (entries cleared: {clear_entries})");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(dir: &Path) -> SharedTournament {
        let config = AppConfig {
            logs_dir: dir.join("logs").to_string_lossy().to_string(),
            ..AppConfig::default()
        };
        TournamentState::shared(config)
    }

    fn register_all(state: &SharedTournament, names: &[&str]) {
        for name in names {
            tournament_register(name.to_string(), format!("{name}.mp3"), state).unwrap();
        }
    }

    #[test]
    fn test_vote_through_to_champion() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        register_all(&state, &["A", "B", "C", "D"]);
        tournament_start(&state).unwrap();

        let first = tournament_current_match(&state).unwrap().unwrap();
        assert_eq!(first.competitor_a.name, "A");
        assert_eq!(first.competitor_b.name, "B");
        assert_eq!(first.round_label, "Semifinal");

        tournament_vote(VoteSlot::A, &state).unwrap();
        tournament_vote(VoteSlot::B, &state).unwrap();
        let final_match = tournament_current_match(&state).unwrap().unwrap();
        assert_eq!(final_match.round_label, "Final");
        assert_eq!(final_match.competitor_b.name, "D");

        let result = tournament_vote(VoteSlot::B, &state).unwrap();
        assert!(result.is_complete());
        assert_eq!(tournament_champion(&state).unwrap().name, "D");
        assert!(tournament_current_match(&state).unwrap().is_none());

        let guard = state.lock().unwrap();
        assert!(guard.started_at.is_some());
        assert!(guard.completed_at.is_some());
        drop(guard);

        let log = std::fs::read_to_string(dir.path().join("logs").join(RESULTS_LOG_FILE_NAME)).unwrap();
        assert!(log.contains("champion=D"));
    }

    #[test]
    fn test_start_requires_two_entries() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        register_all(&state, &["Only"]);
        let err = tournament_start(&state).unwrap_err();
        assert!(err.contains("At least two entrants"));
        assert!(tournament_state(&state).is_err());
    }

    #[test]
    fn test_registration_is_locked_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        register_all(&state, &["A", "B"]);
        tournament_start(&state).unwrap();

        assert!(tournament_register("C".into(), "C.mp3".into(), &state).is_err());
        assert!(tournament_start(&state).is_err());

        tournament_reset(false, &state).unwrap();
        assert_eq!(tournament_register("C".into(), "C.mp3".into(), &state).unwrap(), 3);
        tournament_reset(true, &state).unwrap();
        assert!(tournament_entries(&state).unwrap().is_empty());
    }

    #[test]
    fn test_registry_errors_reach_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        register_all(&state, &["A"]);

        let err = tournament_register("Again".into(), "A.mp3".into(), &state).unwrap_err();
        assert!(err.starts_with("Duplicate entry"));
        let err = tournament_register("Wave".into(), "wave.wav".into(), &state).unwrap_err();
        assert!(err.starts_with("Invalid entry"));

        let entry = tournament_register_path(Path::new("/music/B.mp3"), &state).unwrap();
        assert_eq!(entry.name, "B.mp3");
        assert_eq!(tournament_entries(&state).unwrap().len(), 2);
    }

    #[test]
    fn test_record_reports_engine_errors() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        register_all(&state, &["A", "B", "C"]);
        let snapshot = tournament_start(&state).unwrap();
        let first = snapshot.current_match_id.unwrap();

        let err = tournament_record(first, CompetitorId(2), &state).unwrap_err();
        assert!(err.contains("not a participant"));

        tournament_record(first, CompetitorId(0), &state).unwrap();
        let err = tournament_record(first, CompetitorId(1), &state).unwrap_err();
        assert!(err.contains("different winner"));

        let state_view = tournament_state(&state).unwrap();
        assert_eq!(state_view.rounds[1].matches[0].slot_a.name, "A");
        assert_eq!(state_view.rounds[1].matches[0].slot_b.name, "C");
    }

    #[test]
    fn test_vote_before_start() {
        let state = TournamentState::shared(AppConfig::default());
        assert_eq!(
            tournament_vote(VoteSlot::A, &state).unwrap_err(),
            "Tournament has not started."
        );
        assert!(tournament_champion(&state).is_err());
    }
}
