//! Error type for `chessvault-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] chessvault_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date parse error: {0}")]
  DateParse(String),

  /// The database file does not exist. Stores are never created implicitly
  /// on open.
  #[error("no database at {}", .0.display())]
  NotFound(PathBuf),

  #[error("table {0:?} does not exist")]
  MissingTable(&'static str),

  #[error("table {table:?} has no column {column:?}")]
  MissingColumn {
    table:  &'static str,
    column: &'static str,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
