//! Finding per-source stores under an input directory.

use std::path::{Component, Path, PathBuf};

use chessvault_core::game::DataSource;
use walkdir::WalkDir;

use crate::{Error, Result};

/// A store found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreFile {
  /// Location of the store on disk.
  pub path:     PathBuf,
  /// `path` relative to the directory that was searched.
  pub relative: PathBuf,
}

impl StoreFile {
  /// The provenance label used when none is given: the first directory
  /// under the input root, or the file stem for stores directly in it.
  pub fn default_label(&self) -> Result<DataSource> {
    let mut components = self.relative.components();
    let first = match (components.next(), components.next()) {
      (Some(Component::Normal(dir)), Some(_)) => Some(dir),
      _ => self.relative.file_stem(),
    };
    first
      .and_then(|s| DataSource::new(s.to_string_lossy()).ok())
      .ok_or_else(|| Error::StoreAccess {
        path:   self.path.clone(),
        source: format!(
          "cannot derive a data source label from {}",
          self.relative.display()
        )
        .into(),
      })
  }
}

/// Every regular file under `in_dir` with the given extension, sorted by
/// path.
pub fn discover_stores(in_dir: &Path, extension: &str) -> Result<Vec<StoreFile>> {
  if !in_dir.is_dir() {
    return Err(Error::NoInputFound {
      dir: in_dir.to_path_buf(),
    });
  }

  let mut stores = Vec::new();
  for entry in WalkDir::new(in_dir).follow_links(true) {
    let entry = entry.map_err(|e| Error::StoreAccess {
      path:   e.path().unwrap_or(in_dir).to_path_buf(),
      source: Box::new(e),
    })?;
    if !entry.file_type().is_file()
      || entry.path().extension().is_none_or(|ext| ext != extension)
    {
      continue;
    }
    let relative = entry
      .path()
      .strip_prefix(in_dir)
      .unwrap_or(entry.path())
      .to_path_buf();
    stores.push(StoreFile {
      path: entry.into_path(),
      relative,
    });
  }

  if stores.is_empty() {
    return Err(Error::NoInputFound {
      dir: in_dir.to_path_buf(),
    });
  }
  stores.sort();
  tracing::debug!(dir = %in_dir.display(), stores = stores.len(), "stores discovered");
  Ok(stores)
}
