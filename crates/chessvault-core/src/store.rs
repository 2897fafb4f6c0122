//! The `GameStore` trait and the types that cross it.
//!
//! The trait is implemented by storage backends (e.g.
//! `chessvault-store-sqlite`). The enrichment stage depends on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::game::{DataSource, GameRecord};

// ─── Enrichment types ────────────────────────────────────────────────────────

/// A game still waiting for an opening label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGame {
  /// Store-assigned row identity.
  pub game_id:        i64,
  pub clean_movetext: String,
}

/// The classifier's verdict for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningAssignment {
  pub game_id: i64,
  pub eco:     String,
  pub opening: String,
}

/// What enrichment changed in one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentSummary {
  /// Rows whose provenance label was written.
  pub tagged:     usize,
  /// Rows that received an opening label.
  pub classified: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over one per-source game store.
///
/// Opening labels are write-once: a game that already has one is never
/// offered by [`pending_games`](GameStore::pending_games) and never
/// overwritten by [`apply_openings`](GameStore::apply_openings).
///
/// All methods return `Send` futures so stores can be enriched from
/// concurrent tasks on a multi-threaded runtime.
pub trait GameStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append ingested games and return how many were written.
  fn insert_games(
    &self,
    games: Vec<GameRecord>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Up to `limit` games without an opening and without a parse error whose
  /// id is above `after`, in id order. Page through a store by passing the
  /// last id of the previous page.
  fn pending_games(
    &self,
    after: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<PendingGame>, Self::Error>> + Send + '_;

  /// Label every row with `data_source` and return how many rows were
  /// labelled.
  fn tag_source(
    &self,
    data_source: DataSource,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Record `assignments` in one transaction and return how many games were
  /// labelled. Assignments for games that already have an opening are
  /// ignored.
  fn apply_openings(
    &self,
    assignments: Vec<OpeningAssignment>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Every game in the store, in row order.
  fn list_games(
    &self,
  ) -> impl Future<Output = Result<Vec<GameRecord>, Self::Error>> + Send + '_;
}
