//! Game records — the rows that flow from ingestion through enrichment to
//! the consolidated export.
//!
//! Ingestion produces one [`GameRecord`] per parsed game. Enrichment fills in
//! the opening fields and the provenance label; consolidation projects the
//! record into a [`ConsolidatedGame`] with derived partition keys.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, partition::NULL_PARTITION};

/// Games dated before this year are treated as corrupt or placeholder dates
/// and never exported.
pub const MIN_EXPORT_YEAR: i32 = 1500;

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Label identifying which archive a game came from.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DataSource(String);

impl DataSource {
  /// Build a label, trimming surrounding whitespace. Empty labels and the
  /// null-partition marker are rejected.
  pub fn new(label: impl AsRef<str>) -> Result<Self> {
    let label = label.as_ref().trim();
    if label.is_empty() {
      return Err(Error::EmptyDataSource);
    }
    if label == NULL_PARTITION {
      return Err(Error::ReservedDataSource(label.to_owned()));
    }
    Ok(Self(label.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DataSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── GameRecord ──────────────────────────────────────────────────────────────

/// One parsed chess game as persisted in a per-source store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
  pub event:          Option<String>,
  pub site:           Option<String>,
  pub white:          Option<String>,
  pub black:          Option<String>,
  pub result:         Option<String>,
  pub white_title:    Option<String>,
  pub black_title:    Option<String>,
  pub white_elo:      Option<i32>,
  pub black_elo:      Option<i32>,
  pub utc_date:       Option<NaiveDate>,
  pub utc_time:       Option<String>,
  pub time_control:   Option<String>,
  pub source:         Option<String>,
  /// Move text exactly as it appeared in the archive.
  pub movetext:       Option<String>,
  /// Move text after canonicalization; the string openings are matched
  /// against.
  pub clean_movetext: Option<String>,
  pub eco:            Option<String>,
  pub opening:        Option<String>,
  /// Set by ingestion when the game could not be parsed.
  pub parse_error:    Option<String>,
  /// Absent until the game has been through enrichment.
  pub data_source:    Option<DataSource>,
}

impl GameRecord {
  /// Whether the opening classifier should look at this game.
  pub fn needs_classification(&self) -> bool {
    self.parse_error.is_none() && self.opening.is_none()
  }

  /// Whether this game may appear in the consolidated export.
  pub fn is_exportable(&self, min_year: i32) -> bool {
    self.parse_error.is_none()
      && self.utc_date.is_some_and(|d| d.year() >= min_year)
  }
}

// ─── ConsolidatedGame ────────────────────────────────────────────────────────

/// A game as projected into the combined table and the partitioned export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedGame {
  pub event:          Option<String>,
  pub site:           Option<String>,
  pub white:          Option<String>,
  pub black:          Option<String>,
  pub result:         Option<String>,
  pub white_title:    Option<String>,
  pub black_title:    Option<String>,
  pub white_elo:      Option<i32>,
  pub black_elo:      Option<i32>,
  pub utc_date:       NaiveDate,
  pub utc_time:       Option<String>,
  pub time_control:   Option<String>,
  pub source:         Option<String>,
  pub eco:            Option<String>,
  pub opening:        Option<String>,
  pub clean_movetext: Option<String>,
  /// Resolved provenance: the consolidation override if one was given,
  /// otherwise the store's own label.
  pub data_source:    Option<String>,
  pub year:           i32,
  /// Zero-padded two-digit month.
  pub month:          String,
}
