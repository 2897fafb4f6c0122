//! Error taxonomy of the pipeline stages.
//!
//! Every variant is fatal for the invocation that raised it and names the
//! path it concerns.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No per-source store was found under the input directory.
  #[error("no input stores found in {}", dir.display())]
  NoInputFound { dir: PathBuf },

  /// Enriched stores would be renamed over their own inputs.
  #[error(
    "output directory {} contains input directory {}",
    out_dir.display(),
    in_dir.display()
  )]
  OutputOverlapsInput { in_dir: PathBuf, out_dir: PathBuf },

  #[error("cannot load opening catalogue {}: {source}", path.display())]
  MissingCatalogue {
    path:   PathBuf,
    #[source]
    source: chessvault_store_sqlite::Error,
  },

  #[error("cannot access store {}: {source}", path.display())]
  StoreAccess {
    path:   PathBuf,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// A store lacks a column consolidation projects.
  #[error("store {} has no {field:?} field", store.display())]
  MissingField { store: PathBuf, field: String },

  #[error("cannot write export {}: {source}", path.display())]
  ExportWrite {
    path:   PathBuf,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl Error {
  pub(crate) fn store_access<E>(path: impl Into<PathBuf>) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let path = path.into();
    move |source| Self::StoreAccess {
      path,
      source: Box::new(source),
    }
  }

  /// Like [`Error::store_access`], but a store missing a projected column is
  /// reported as [`Error::MissingField`].
  pub(crate) fn store_schema(
    path: impl Into<PathBuf>,
  ) -> impl FnOnce(chessvault_store_sqlite::Error) -> Self {
    let path = path.into();
    move |source| match source {
      chessvault_store_sqlite::Error::MissingColumn { column, .. } => {
        Self::MissingField {
          store: path,
          field: column.to_owned(),
        }
      }
      source => Self::store_access(path)(source),
    }
  }

  pub(crate) fn export_write<E>(path: impl Into<PathBuf>) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let path = path.into();
    move |source| Self::ExportWrite {
      path,
      source: Box::new(source),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
