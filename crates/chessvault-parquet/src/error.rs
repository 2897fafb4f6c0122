//! Error types for the chessvault Parquet export.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error at {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Two partitions rendered to the same directory.
  #[error("partition file {} already exists", .0.display())]
  PartitionExists(PathBuf),

  #[error("arrow error: {0}")]
  Arrow(#[from] arrow_schema::ArrowError),

  #[error("parquet error: {0}")]
  Parquet(#[from] parquet::errors::ParquetError),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { path, source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
