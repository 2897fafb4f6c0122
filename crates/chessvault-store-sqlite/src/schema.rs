//! SQL schema for the chessvault SQLite databases.
//!
//! Three kinds of database share this crate: per-source game stores, the
//! opening catalogue, and the combined working table built during
//! consolidation.

/// Per-source store DDL. Ingestion creates it; `data_source` is added later
/// by enrichment.
pub const GAMES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS games (
    event          TEXT,
    site           TEXT,
    white          TEXT,
    black          TEXT,
    result         TEXT,
    white_title    TEXT,
    black_title    TEXT,
    white_elo      INTEGER,
    black_elo      INTEGER,
    utc_date       TEXT,            -- ISO 8601 date, YYYY-MM-DD
    utc_time       TEXT,
    time_control   TEXT,
    source         TEXT,
    movetext       TEXT,
    clean_movetext TEXT,            -- canonical move text
    eco            TEXT,            -- write-once, set by enrichment
    opening        TEXT,            -- write-once, set by enrichment
    parse_error    TEXT             -- non-NULL rows are never processed
);
";

/// Opening catalogue DDL. Row order is catalogue order.
pub const OPENINGS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS openings (
    eco  TEXT NOT NULL,
    name TEXT NOT NULL,
    uci  TEXT NOT NULL,
    pgn  TEXT NOT NULL
);
";

/// Combined working table DDL. Always created fresh.
pub const COMBINED_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE combined (
    event          TEXT,
    site           TEXT,
    white          TEXT,
    black          TEXT,
    result         TEXT,
    white_title    TEXT,
    black_title    TEXT,
    white_elo      INTEGER,
    black_elo      INTEGER,
    utc_date       TEXT NOT NULL,
    utc_time       TEXT,
    time_control   TEXT,
    source         TEXT,
    eco            TEXT,
    opening        TEXT,
    clean_movetext TEXT,
    data_source    TEXT,
    year           INTEGER NOT NULL,
    month          TEXT NOT NULL    -- zero-padded, '01'..'12'
);
";

/// Built after the merge so appends don't pay for index maintenance.
pub const COMBINED_INDEX: &str = "
CREATE INDEX IF NOT EXISTS combined_partition_idx
    ON combined(data_source, year, month);
";

/// Columns a store must have to take part in consolidation.
pub const PROJECTED_COLUMNS: &[&str] = &[
  "event",
  "site",
  "white",
  "black",
  "result",
  "white_title",
  "black_title",
  "white_elo",
  "black_elo",
  "utc_date",
  "utc_time",
  "time_control",
  "source",
  "eco",
  "opening",
  "clean_movetext",
  "parse_error",
];

pub const DATA_SOURCE_COLUMN: &str = "data_source";
