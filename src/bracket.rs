use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{BracketError, Result};
use crate::types::{
  AdvanceResult, BracketState, Competitor, CompetitorId, Cursor, Entry, MatchId, MatchView, RoundView,
  Slot, SlotView, BYE_LABEL, PENDING_LABEL,
};

#[derive(Clone, Debug)]
pub struct Match {
  id: MatchId,
  round_index: usize,
  index: usize,
  slots: [Slot; 2],
  winner: Option<Slot>,
  auto_resolved: bool,
}

impl Match {
  fn new(id: MatchId, round_index: usize, index: usize, slot_a: Slot, slot_b: Slot) -> Self {
    Match {
      id,
      round_index,
      index,
      slots: [slot_a, slot_b],
      winner: None,
      auto_resolved: false,
    }
  }

  pub fn id(&self) -> MatchId {
    self.id
  }

  pub fn round_index(&self) -> usize {
    self.round_index
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn slot_a(&self) -> Slot {
    self.slots[0]
  }

  pub fn slot_b(&self) -> Slot {
    self.slots[1]
  }

  pub fn winner(&self) -> Option<Slot> {
    self.winner
  }

  pub fn winner_id(&self) -> Option<CompetitorId> {
    self.winner.and_then(Slot::competitor_id)
  }

  pub fn is_resolved(&self) -> bool {
    self.winner.is_some()
  }

  /// True when the winner was set without a vote.
  pub fn was_auto_resolved(&self) -> bool {
    self.auto_resolved
  }

  pub fn has_participant(&self, id: CompetitorId) -> bool {
    self.slots.contains(&Slot::Competitor(id))
  }

  /// Returns `Ok(false)` when the same winner was already recorded.
  fn set_winner(&mut self, winner: Slot) -> Result<bool> {
    if winner == Slot::Pending || !self.slots.contains(&winner) {
      return Err(match winner.competitor_id() {
        Some(id) => BracketError::InvalidWinner {
          match_id: self.id,
          winner: id,
        },
        None => BracketError::invariant(format!("{} cannot be won by {winner:?}", self.id)),
      });
    }
    match self.winner {
      Some(existing) if existing == winner => Ok(false),
      Some(_) => Err(BracketError::ResultConflict { match_id: self.id }),
      None => {
        self.winner = Some(winner);
        Ok(true)
      }
    }
  }

  /// Winner that needs no vote: a lone real competitor against a BYE, or a
  /// BYE that advances from an empty pairing.
  fn uncontested_winner(&self) -> Option<Slot> {
    match (self.slots[0], self.slots[1]) {
      (Slot::Competitor(_), Slot::Bye) => Some(self.slots[0]),
      (Slot::Bye, Slot::Competitor(_)) => Some(self.slots[1]),
      (Slot::Bye, Slot::Bye) => Some(Slot::Bye),
      _ => None,
    }
  }
}

#[derive(Clone, Debug)]
pub struct Round {
  index: usize,
  matches: Vec<Match>,
}

impl Round {
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn matches(&self) -> &[Match] {
    &self.matches
  }

  pub fn is_resolved(&self) -> bool {
    self.matches.iter().all(Match::is_resolved)
  }

  fn winners(&self) -> Result<Vec<Slot>> {
    self
      .matches
      .iter()
      .map(|m| {
        m.winner
          .ok_or_else(|| BracketError::invariant(format!("{} has no winner", m.id)))
      })
      .collect()
  }
}

/// Single-elimination bracket.
///
/// Competitors live in an arena indexed by [`CompetitorId`]; matches refer
/// to them by id. Rounds after the first are built only once the previous
/// round is fully resolved, and matches decided by a BYE are resolved
/// before control returns to the caller.
#[derive(Clone, Debug)]
pub struct Bracket {
  competitors: Vec<Competitor>,
  rounds: Vec<Round>,
  match_index: HashMap<MatchId, (usize, usize)>,
  bracket_size: usize,
  cursor: Option<Cursor>,
  champion: Option<CompetitorId>,
  next_match_id: u32,
}

impl Bracket {
  pub fn new(entries: &[Entry]) -> Result<Self> {
    if entries.len() < 2 {
      return Err(BracketError::InsufficientEntrants { count: entries.len() });
    }
    let competitors = entries
      .iter()
      .enumerate()
      .map(|(idx, entry)| Competitor {
        id: CompetitorId(idx as u32),
        name: entry.name.clone(),
        source_ref: entry.source_ref.clone(),
      })
      .collect::<Vec<_>>();

    let bracket_size = next_power_of_two(competitors.len());
    let mut seeds = competitors
      .iter()
      .map(|c| Slot::Competitor(c.id))
      .collect::<Vec<_>>();
    seeds.resize(bracket_size, Slot::Bye);

    let mut bracket = Bracket {
      competitors,
      rounds: Vec::new(),
      match_index: HashMap::new(),
      bracket_size,
      cursor: None,
      champion: None,
      next_match_id: 1,
    };
    bracket.push_round(&seeds)?;
    info!(
      "Bracket created: {} entrants, {} slots, {} rounds",
      bracket.competitors.len(),
      bracket_size,
      bracket.expected_round_count()
    );
    bracket.settle()?;
    Ok(bracket)
  }

  /// The match awaiting a result, or `None` once the tournament is over.
  pub fn current_match(&self) -> Option<&Match> {
    let cursor = self.cursor?;
    self.rounds.get(cursor.round_index)?.matches.get(cursor.match_index)
  }

  /// Record the winner of the active match and move the cursor.
  ///
  /// Resubmitting the recorded winner of an already resolved match is a
  /// no-op that reports the current cursor state.
  pub fn record_result(&mut self, match_id: MatchId, winner: CompetitorId) -> Result<AdvanceResult> {
    let (round_index, match_index) = self
      .match_index
      .get(&match_id)
      .copied()
      .ok_or(BracketError::UnknownMatch { match_id })?;
    let is_active = self.cursor
      == Some(Cursor {
        round_index,
        match_index,
      });

    let current = &mut self.rounds[round_index].matches[match_index];
    if !current.is_resolved() && !is_active {
      return Err(BracketError::UnknownMatch { match_id });
    }
    if !current.has_participant(winner) {
      return Err(BracketError::InvalidWinner { match_id, winner });
    }
    if !current.set_winner(Slot::Competitor(winner))? {
      debug!("Repeated result for {match_id} ignored");
      return self.advance_result();
    }

    let loser = current.slots.iter().copied().find(|slot| *slot != Slot::Competitor(winner));
    info!(
      "{match_id}: {} beats {}",
      self.slot_label(Slot::Competitor(winner)),
      loser.map(|slot| self.slot_label(slot)).unwrap_or_default()
    );
    self.settle()?;
    self.advance_result()
  }

  /// True once the last round is a single match with a winner.
  pub fn is_complete(&self) -> bool {
    match self.rounds.last() {
      Some(round) => round.matches.len() == 1 && round.matches[0].is_resolved(),
      None => false,
    }
  }

  pub fn champion(&self) -> Result<&Competitor> {
    if !self.is_complete() {
      return Err(BracketError::NotComplete);
    }
    self
      .champion
      .and_then(|id| self.competitor(id))
      .ok_or_else(|| BracketError::invariant("completed bracket has no champion"))
  }

  pub fn cursor(&self) -> Option<Cursor> {
    self.cursor
  }

  pub fn competitor(&self, id: CompetitorId) -> Option<&Competitor> {
    self.competitors.get(id.0 as usize)
  }

  pub fn competitors(&self) -> &[Competitor] {
    &self.competitors
  }

  pub fn entrant_count(&self) -> usize {
    self.competitors.len()
  }

  /// Number of slots in the first round, BYEs included.
  pub fn bracket_size(&self) -> usize {
    self.bracket_size
  }

  pub fn rounds(&self) -> &[Round] {
    &self.rounds
  }

  /// Rounds built so far.
  pub fn round_count(&self) -> usize {
    self.rounds.len()
  }

  /// Rounds the finished bracket will have.
  pub fn expected_round_count(&self) -> usize {
    self.bracket_size.trailing_zeros() as usize
  }

  pub fn get_match(&self, match_id: MatchId) -> Option<&Match> {
    let (round_index, match_index) = self.match_index.get(&match_id).copied()?;
    self.rounds.get(round_index)?.matches.get(match_index)
  }

  pub fn round_label(&self, round_index: usize) -> String {
    round_label(round_index, self.expected_round_count())
  }

  /// Display name for a slot.
  pub fn slot_label(&self, slot: Slot) -> String {
    slot_label(&self.competitors, slot)
  }

  /// Full view of the bracket, including rounds not built yet.
  pub fn snapshot(&self) -> BracketState {
    let total_rounds = self.expected_round_count();
    let mut rounds = Vec::with_capacity(total_rounds);

    for round in &self.rounds {
      let matches = round
        .matches
        .iter()
        .map(|m| {
          let is_active = self.cursor
            == Some(Cursor {
              round_index: round.index,
              match_index: m.index,
            });
          let state = match (m.winner, is_active) {
            (Some(Slot::Bye), _) => "skipped",
            (Some(_), _) => "completed",
            (None, true) => "active",
            (None, false) => "pending",
          };
          MatchView {
            id: Some(m.id),
            index: m.index,
            state: state.to_string(),
            slot_a: self.slot_view(m.slots[0]),
            slot_b: self.slot_view(m.slots[1]),
            winner_name: m.winner.map(|slot| self.slot_label(slot)),
          }
        })
        .collect();
      rounds.push(RoundView {
        index: round.index,
        label: self.round_label(round.index),
        generated: true,
        matches,
      });
    }

    for index in self.rounds.len()..total_rounds {
      let match_count = self.bracket_size >> (index + 1);
      let matches = (0..match_count)
        .map(|match_index| MatchView {
          id: None,
          index: match_index,
          state: "pending".to_string(),
          slot_a: self.slot_view(Slot::Pending),
          slot_b: self.slot_view(Slot::Pending),
          winner_name: None,
        })
        .collect();
      rounds.push(RoundView {
        index,
        label: self.round_label(index),
        generated: false,
        matches,
      });
    }

    BracketState {
      entrant_count: self.competitors.len(),
      bracket_size: self.bracket_size,
      round_count: total_rounds,
      rounds,
      cursor: self.cursor,
      current_match_id: self.current_match().map(Match::id),
      is_complete: self.is_complete(),
      champion: self.champion().ok().cloned(),
    }
  }

  fn slot_view(&self, slot: Slot) -> SlotView {
    let kind = match slot {
      Slot::Competitor(_) => "competitor",
      Slot::Bye => "bye",
      Slot::Pending => "pending",
    };
    let competitor = slot.competitor_id().and_then(|id| self.competitor(id));
    SlotView {
      kind: kind.to_string(),
      competitor_id: slot.competitor_id(),
      name: self.slot_label(slot),
      source_ref: competitor.map(|c| c.source_ref.clone()),
    }
  }

  fn advance_result(&self) -> Result<AdvanceResult> {
    match (self.cursor, self.champion) {
      (Some(cursor), _) => {
        let current = self
          .current_match()
          .ok_or_else(|| BracketError::invariant(format!("cursor {cursor:?} points past the bracket")))?;
        Ok(AdvanceResult::NextMatch {
          match_id: current.id,
          cursor,
        })
      }
      (None, Some(champion)) => Ok(AdvanceResult::TournamentComplete { champion }),
      (None, None) => Err(BracketError::invariant("bracket has neither an active match nor a champion")),
    }
  }

  /// Pair `slots` as (0,1), (2,3), ... into a new round.
  fn push_round(&mut self, slots: &[Slot]) -> Result<()> {
    let round_index = self.rounds.len();
    if slots.len() < 2 || slots.len() % 2 != 0 {
      return Err(BracketError::invariant(format!(
        "round {} cannot pair {} slots",
        round_index + 1,
        slots.len()
      )));
    }
    let mut matches = Vec::with_capacity(slots.len() / 2);
    for (match_index, pair) in slots.chunks_exact(2).enumerate() {
      let id = MatchId(self.next_match_id);
      self.next_match_id += 1;
      self.match_index.insert(id, (round_index, match_index));
      matches.push(Match::new(id, round_index, match_index, pair[0], pair[1]));
    }
    self.rounds.push(Round {
      index: round_index,
      matches,
    });
    Ok(())
  }

  /// Resolve uncontested matches, build follow-up rounds as rounds finish,
  /// and leave the cursor on the first match that needs a vote.
  fn settle(&mut self) -> Result<()> {
    loop {
      let competitors = &self.competitors;
      let round = self
        .rounds
        .last_mut()
        .ok_or_else(|| BracketError::invariant("bracket has no rounds"))?;
      let round_index = round.index;

      for m in round.matches.iter_mut().filter(|m| !m.is_resolved()) {
        if let Some(winner) = m.uncontested_winner() {
          m.set_winner(winner)?;
          m.auto_resolved = true;
          debug!(
            "{} auto-resolved: {} advances",
            m.id,
            slot_label(competitors, winner)
          );
        }
      }

      if let Some(match_index) = round.matches.iter().position(|m| !m.is_resolved()) {
        self.cursor = Some(Cursor {
          round_index,
          match_index,
        });
        return Ok(());
      }

      let winners = round.winners()?;
      if winners.len() == 1 {
        let champion = winners[0]
          .competitor_id()
          .ok_or_else(|| BracketError::invariant("final was won by a BYE"))?;
        self.cursor = None;
        self.champion = Some(champion);
        info!("Champion decided: {}", self.slot_label(winners[0]));
        return Ok(());
      }

      self.push_round(&winners)?;
      info!(
        "{} generated with {} matches",
        self.round_label(round_index + 1),
        winners.len() / 2
      );
    }
  }
}

/// Label a round by its distance from the final.
pub fn round_label(round_index: usize, total_rounds: usize) -> String {
  match total_rounds.saturating_sub(round_index) {
    1 => "Final".to_string(),
    2 => "Semifinal".to_string(),
    3 => "Quarterfinal".to_string(),
    _ => format!("Round {}", round_index + 1),
  }
}

fn slot_label(competitors: &[Competitor], slot: Slot) -> String {
  match slot {
    Slot::Competitor(id) => competitors
      .get(id.0 as usize)
      .map(|c| c.name.clone())
      .unwrap_or_else(|| id.to_string()),
    Slot::Bye => BYE_LABEL.to_string(),
    Slot::Pending => PENDING_LABEL.to_string(),
  }
}

fn next_power_of_two(n: usize) -> usize {
  n.max(1).next_power_of_two()
}
