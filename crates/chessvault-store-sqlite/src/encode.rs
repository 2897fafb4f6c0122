//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Dates are stored as ISO 8601 `YYYY-MM-DD` strings so SQLite's own date
//! functions can derive partition keys from them.

use std::path::Path;

use chessvault_core::{
  game::{ConsolidatedGame, DataSource, GameRecord},
  partition::PartitionKey,
};
use chrono::NaiveDate;

use crate::{Error, Result};

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Month ───────────────────────────────────────────────────────────────────

pub fn decode_month(s: &str) -> Result<u32> {
  s.parse()
    .map_err(|_| Error::DateParse(format!("bad month {s:?}")))
}

// ─── Paths ───────────────────────────────────────────────────────────────────

/// A read-only SQLite URI for `path`, for use with `ATTACH`.
pub fn readonly_uri(path: &Path) -> String {
  let mut uri = String::from("file:");
  for c in path.to_string_lossy().chars() {
    match c {
      '%' => uri.push_str("%25"),
      '?' => uri.push_str("%3f"),
      '#' => uri.push_str("%23"),
      c => uri.push(c),
    }
  }
  uri.push_str("?mode=ro");
  uri
}

// ─── Schema introspection ────────────────────────────────────────────────────

/// Column names of `schema.table`; empty when the table does not exist.
pub fn table_columns(
  conn: &rusqlite::Connection,
  schema: &str,
  table: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(&format!("PRAGMA {schema}.table_info({table})"))?;
  let columns = stmt
    .query_map([], |row| row.get::<_, String>(1))?
    .collect();
  columns
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `games` row.
pub struct RawGame {
  pub event:          Option<String>,
  pub site:           Option<String>,
  pub white:          Option<String>,
  pub black:          Option<String>,
  pub result:         Option<String>,
  pub white_title:    Option<String>,
  pub black_title:    Option<String>,
  pub white_elo:      Option<i32>,
  pub black_elo:      Option<i32>,
  pub utc_date:       Option<String>,
  pub utc_time:       Option<String>,
  pub time_control:   Option<String>,
  pub source:         Option<String>,
  pub movetext:       Option<String>,
  pub clean_movetext: Option<String>,
  pub eco:            Option<String>,
  pub opening:        Option<String>,
  pub parse_error:    Option<String>,
  pub data_source:    Option<String>,
}

impl RawGame {
  /// Column list matching [`RawGame::from_row`]. `data_source` is read as
  /// NULL from stores that have not been enriched yet.
  pub fn select_list(has_data_source: bool) -> String {
    let data_source = if has_data_source { "data_source" } else { "NULL" };
    format!(
      "event, site, white, black, result, white_title, black_title,
       white_elo, black_elo, utc_date, utc_time, time_control, source,
       movetext, clean_movetext, eco, opening, parse_error, {data_source}"
    )
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event:          row.get(0)?,
      site:           row.get(1)?,
      white:          row.get(2)?,
      black:          row.get(3)?,
      result:         row.get(4)?,
      white_title:    row.get(5)?,
      black_title:    row.get(6)?,
      white_elo:      row.get(7)?,
      black_elo:      row.get(8)?,
      utc_date:       row.get(9)?,
      utc_time:       row.get(10)?,
      time_control:   row.get(11)?,
      source:         row.get(12)?,
      movetext:       row.get(13)?,
      clean_movetext: row.get(14)?,
      eco:            row.get(15)?,
      opening:        row.get(16)?,
      parse_error:    row.get(17)?,
      data_source:    row.get(18)?,
    })
  }

  pub fn into_game(self) -> Result<GameRecord> {
    Ok(GameRecord {
      event:          self.event,
      site:           self.site,
      white:          self.white,
      black:          self.black,
      result:         self.result,
      white_title:    self.white_title,
      black_title:    self.black_title,
      white_elo:      self.white_elo,
      black_elo:      self.black_elo,
      utc_date:       self.utc_date.as_deref().map(decode_date).transpose()?,
      utc_time:       self.utc_time,
      time_control:   self.time_control,
      source:         self.source,
      movetext:       self.movetext,
      clean_movetext: self.clean_movetext,
      eco:            self.eco,
      opening:        self.opening,
      parse_error:    self.parse_error,
      data_source:    self.data_source.map(DataSource::new).transpose()?,
    })
  }
}

/// Raw values read directly from a `combined` row.
pub struct RawConsolidated {
  pub event:          Option<String>,
  pub site:           Option<String>,
  pub white:          Option<String>,
  pub black:          Option<String>,
  pub result:         Option<String>,
  pub white_title:    Option<String>,
  pub black_title:    Option<String>,
  pub white_elo:      Option<i32>,
  pub black_elo:      Option<i32>,
  pub utc_date:       String,
  pub utc_time:       Option<String>,
  pub time_control:   Option<String>,
  pub source:         Option<String>,
  pub eco:            Option<String>,
  pub opening:        Option<String>,
  pub clean_movetext: Option<String>,
  pub data_source:    Option<String>,
  pub year:           i32,
  pub month:          String,
}

impl RawConsolidated {
  pub const SELECT_LIST: &'static str =
    "event, site, white, black, result, white_title, black_title,
     white_elo, black_elo, utc_date, utc_time, time_control, source,
     eco, opening, clean_movetext, data_source, year, month";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event:          row.get(0)?,
      site:           row.get(1)?,
      white:          row.get(2)?,
      black:          row.get(3)?,
      result:         row.get(4)?,
      white_title:    row.get(5)?,
      black_title:    row.get(6)?,
      white_elo:      row.get(7)?,
      black_elo:      row.get(8)?,
      utc_date:       row.get(9)?,
      utc_time:       row.get(10)?,
      time_control:   row.get(11)?,
      source:         row.get(12)?,
      eco:            row.get(13)?,
      opening:        row.get(14)?,
      clean_movetext: row.get(15)?,
      data_source:    row.get(16)?,
      year:           row.get(17)?,
      month:          row.get(18)?,
    })
  }

  pub fn into_consolidated(self) -> Result<ConsolidatedGame> {
    Ok(ConsolidatedGame {
      event:          self.event,
      site:           self.site,
      white:          self.white,
      black:          self.black,
      result:         self.result,
      white_title:    self.white_title,
      black_title:    self.black_title,
      white_elo:      self.white_elo,
      black_elo:      self.black_elo,
      utc_date:       decode_date(&self.utc_date)?,
      utc_time:       self.utc_time,
      time_control:   self.time_control,
      source:         self.source,
      eco:            self.eco,
      opening:        self.opening,
      clean_movetext: self.clean_movetext,
      data_source:    self.data_source,
      year:           self.year,
      month:          self.month,
    })
  }
}

/// Raw values of one `GROUP BY` row of the partition summary.
pub struct RawPartitionCount {
  pub data_source: Option<String>,
  pub year:        i32,
  pub month:       String,
  pub rows:        i64,
}

impl RawPartitionCount {
  pub fn into_key(self) -> Result<(PartitionKey, usize)> {
    let key =
      PartitionKey::new(self.data_source, self.year, decode_month(&self.month)?)?;
    Ok((key, usize::try_from(self.rows).unwrap_or_default()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dates_round_trip_as_iso() {
    let d = NaiveDate::from_ymd_opt(2013, 1, 5).unwrap();
    assert_eq!(encode_date(d), "2013-01-05");
    assert_eq!(decode_date("2013-01-05").unwrap(), d);
  }

  #[test]
  fn pgn_style_dates_are_rejected() {
    assert!(matches!(decode_date("2013.01.05"), Err(Error::DateParse(_))));
  }

  #[test]
  fn readonly_uri_escapes_uri_metacharacters() {
    assert_eq!(
      readonly_uri(Path::new("/data/a?b#c%d.db")),
      "file:/data/a%3fb%23c%25d.db?mode=ro"
    );
  }
}
