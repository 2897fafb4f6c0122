//! The opening catalogue — the read-only reference table games are
//! classified against.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, movetext::canonicalize};

/// One known opening line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningEntry {
  pub eco:  String,
  pub name: String,
  /// The line in UCI notation, space separated (`e2e4 e7e5`).
  pub uci:  String,
  /// The same line as PGN move text; this is what gets matched.
  pub pgn:  String,
}

impl OpeningEntry {
  /// Number of half-moves in the line. Deeper lines are more specific.
  pub fn ply(&self) -> usize { self.uci.split_whitespace().count() }
}

/// An ordered, validated set of openings.
///
/// Order is significant: it is the tie-break among equally deep matches.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
  entries: Vec<OpeningEntry>,
}

impl Catalogue {
  /// Build a catalogue, rewriting every `pgn` into canonical move text so it
  /// lines up with canonical game move text.
  pub fn new(entries: impl IntoIterator<Item = OpeningEntry>) -> Result<Self> {
    let entries = entries
      .into_iter()
      .map(|mut entry| {
        entry.pgn = canonicalize(&entry.pgn);
        if entry.pgn.is_empty() {
          return Err(Error::EmptyOpeningLine {
            eco:  entry.eco,
            name: entry.name,
          });
        }
        Ok(entry)
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(Self { entries })
  }

  pub fn entries(&self) -> &[OpeningEntry] { &self.entries }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(pgn: &str) -> OpeningEntry {
    OpeningEntry {
      eco:  "C20".into(),
      name: "King's Pawn Game".into(),
      uci:  "e2e4 e7e5".into(),
      pgn:  pgn.into(),
    }
  }

  #[test]
  fn ply_counts_uci_half_moves() {
    assert_eq!(entry("1. e4 e5").ply(), 2);
  }

  #[test]
  fn catalogue_canonicalizes_lines() {
    let cat = Catalogue::new([entry("1.e4  e5")]).unwrap();
    assert_eq!(cat.entries()[0].pgn, "1. e4 e5");
  }

  #[test]
  fn empty_lines_are_rejected() {
    let err = Catalogue::new([entry("{nothing here}")]).unwrap_err();
    assert!(matches!(err, Error::EmptyOpeningLine { .. }));
  }

  #[test]
  fn order_is_preserved() {
    let mut second = entry("1. d4");
    second.eco = "A40".into();
    let cat = Catalogue::new([entry("1. e4 e5"), second]).unwrap();
    assert_eq!(cat.len(), 2);
    assert_eq!(cat.entries()[1].eco, "A40");
  }
}
