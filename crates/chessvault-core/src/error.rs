//! Error types for `chessvault-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A catalogue entry whose move text canonicalizes to nothing would match
  /// every game, so it is rejected up front.
  #[error("opening {eco} {name:?} has an empty move line")]
  EmptyOpeningLine { eco: String, name: String },

  #[error("data source label must not be empty")]
  EmptyDataSource,

  /// The label partition directories use for a missing data source.
  #[error("data source label {0:?} is reserved")]
  ReservedDataSource(String),

  #[error("month out of range: {0}")]
  InvalidMonth(u32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
