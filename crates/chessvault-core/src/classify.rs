//! Opening classification.
//!
//! A catalogue line matches a game when the line's canonical move text occurs
//! in the game's canonical move text. Among all matching lines the deepest
//! (greatest ply) wins; among equally deep lines the one that comes first in
//! the catalogue wins. No match is a valid outcome, not an error.
//!
//! # Index
//!
//! Testing every line against every game is the dominant cost of a run, so
//! [`Classifier`] prunes with a token index that never changes the result.
//! Both texts are single-space separated, so whenever a line of three or more
//! tokens occurs in a game, each of the line's *interior* tokens occurs in the
//! game as a whole token. Every such line is filed under its rarest interior
//! token; lines of one or two tokens are always candidates. A game's
//! candidates are the lines filed under any of its tokens, and each candidate
//! is confirmed with the real text test.

use std::{
  cmp::Reverse,
  collections::{HashMap, HashSet},
};

use serde::{Deserialize, Serialize};

use crate::{
  movetext::canonicalize,
  opening::{Catalogue, OpeningEntry},
  store::{OpeningAssignment, PendingGame},
};

/// How a catalogue line has to occur in a game's move text.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
  /// The line may occur anywhere in the game.
  #[default]
  Contains,
  /// The line must be the start of the game, ending on a token boundary.
  Prefix,
}

impl MatchMode {
  fn matches(self, line: &str, game: &str) -> bool {
    match self {
      Self::Contains => game.contains(line),
      Self::Prefix => game
        .strip_prefix(line)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(' ')),
    }
  }
}

/// A catalogue prepared for repeated lookups. Immutable once built, so it can
/// be shared across enrichment workers.
#[derive(Debug)]
pub struct Classifier {
  catalogue: Catalogue,
  mode:      MatchMode,
  /// `ply` of each entry, by catalogue position.
  plies:     Vec<usize>,
  /// Entries filed under their rarest interior token.
  by_token:  HashMap<String, Vec<usize>>,
  /// Entries too short to have an interior token.
  always:    Vec<usize>,
}

impl Classifier {
  pub fn new(catalogue: Catalogue, mode: MatchMode) -> Self {
    let entries = catalogue.entries();
    let plies = entries.iter().map(OpeningEntry::ply).collect();

    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
      let distinct: HashSet<&str> = interior_tokens(&entry.pgn).collect();
      for token in distinct {
        *frequency.entry(token).or_default() += 1;
      }
    }

    let mut by_token: HashMap<String, Vec<usize>> = HashMap::new();
    let mut always = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
      // `min_by_key` keeps the first of equally rare tokens.
      match interior_tokens(&entry.pgn).min_by_key(|t| frequency[t]) {
        Some(key) => by_token.entry(key.to_owned()).or_default().push(idx),
        None => always.push(idx),
      }
    }

    Self {
      catalogue,
      mode,
      plies,
      by_token,
      always,
    }
  }

  pub fn mode(&self) -> MatchMode { self.mode }

  pub fn catalogue(&self) -> &Catalogue { &self.catalogue }

  /// The best opening for `movetext`, or `None` if no line matches.
  pub fn classify(&self, movetext: &str) -> Option<&OpeningEntry> {
    let game = canonicalize(movetext);
    let entries = self.catalogue.entries();

    let mut seen = HashSet::new();
    let filed = game
      .split(' ')
      .filter(|token| seen.insert(*token))
      .filter_map(|token| self.by_token.get(token))
      .flatten();

    self
      .always
      .iter()
      .chain(filed)
      .copied()
      .filter(|&idx| self.mode.matches(&entries[idx].pgn, &game))
      .max_by_key(|&idx| (self.plies[idx], Reverse(idx)))
      .map(|idx| &entries[idx])
  }

  /// Classify a batch of pending games. Games with no match are omitted.
  pub fn assign(&self, pending: &[PendingGame]) -> Vec<OpeningAssignment> {
    pending
      .iter()
      .filter_map(|game| {
        self.classify(&game.clean_movetext).map(|entry| OpeningAssignment {
          game_id: game.game_id,
          eco:     entry.eco.clone(),
          opening: entry.name.clone(),
        })
      })
      .collect()
  }
}

/// Tokens of a canonical line other than its first and last.
fn interior_tokens(line: &str) -> impl Iterator<Item = &str> {
  let tokens: Vec<&str> = line.split(' ').collect();
  let end = tokens.len().saturating_sub(1);
  tokens.into_iter().take(end).skip(1)
}
