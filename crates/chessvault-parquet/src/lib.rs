//! Hive-partitioned Parquet export for chessvault.
//!
//! An export is built in a staging directory next to the target and swapped
//! into place on [`ExportDir::commit`], so the target directory only ever
//! holds the output of one complete run. Writing is synchronous; async callers
//! should drive a [`PartitionWriter`] from blocking tasks.
//!
//! ```no_run
//! use chessvault_core::partition::PartitionKey;
//! use chessvault_parquet::{ExportDir, ExportOptions, write_partition};
//!
//! let options = ExportOptions::default();
//! let export = ExportDir::stage("out/parquet").unwrap();
//! let key = PartitionKey::new(Some("lichess".into()), 2013, 1).unwrap();
//! write_partition(export.staging_dir(), &key, &[], options).unwrap();
//! export.commit().unwrap();
//! ```

pub mod batch;
pub mod error;

use std::{
  ffi::OsString,
  fs::File,
  path::{Path, PathBuf},
};

use chessvault_core::{game::ConsolidatedGame, partition::PartitionKey};
pub use error::{Error, Result};
use parquet::{
  arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties,
};

/// File name of the single data file in each partition directory.
pub const DATA_FILE: &str = "data_0.parquet";

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
  /// Upper bound on rows per Parquet row group.
  pub row_group_size: usize,
}

impl Default for ExportOptions {
  fn default() -> Self { Self { row_group_size: 65_536 } }
}

// ─── Staged export directory ─────────────────────────────────────────────────

/// An export being assembled in `<out>.staging`.
///
/// Dropping an uncommitted export removes the staging directory and leaves
/// the target untouched.
#[derive(Debug)]
pub struct ExportDir {
  target:    PathBuf,
  staging:   PathBuf,
  committed: bool,
}

fn sibling(path: &Path, suffix: &str) -> Result<PathBuf> {
  let name = path.file_name().ok_or_else(|| Error::Io {
    path:   path.to_path_buf(),
    source: std::io::Error::new(
      std::io::ErrorKind::InvalidInput,
      "export directory has no final path component",
    ),
  })?;
  let mut name = OsString::from(name);
  name.push(suffix);
  Ok(path.with_file_name(name))
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
  match std::fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(Error::io(path)(e)),
  }
}

impl ExportDir {
  /// Start a fresh staging directory for an export that will replace
  /// `target`. Leftovers of an earlier interrupted export are discarded.
  pub fn stage(target: impl AsRef<Path>) -> Result<Self> {
    let target = target.as_ref();
    let target = std::path::absolute(target).map_err(Error::io(target))?;
    let staging = sibling(&target, ".staging")?;

    remove_dir_if_exists(&staging)?;
    std::fs::create_dir_all(&staging).map_err(Error::io(&staging))?;
    tracing::debug!(staging = %staging.display(), "export staged");

    Ok(Self { target, staging, committed: false })
  }

  /// The directory partitions are written into until commit.
  pub fn staging_dir(&self) -> &Path { &self.staging }

  /// The directory the export will occupy once committed.
  pub fn target(&self) -> &Path { &self.target }

  /// Replace the target directory with the staged export, discarding
  /// whatever the target held before.
  pub fn commit(mut self) -> Result<PathBuf> {
    let previous = sibling(&self.target, ".previous")?;
    remove_dir_if_exists(&previous)?;

    let had_target = self.target.exists();
    if had_target {
      std::fs::rename(&self.target, &previous)
        .map_err(Error::io(&self.target))?;
    }
    std::fs::rename(&self.staging, &self.target)
      .map_err(Error::io(&self.staging))?;
    self.committed = true;

    if had_target {
      remove_dir_if_exists(&previous)?;
    }
    tracing::debug!(target = %self.target.display(), "export committed");
    Ok(self.target.clone())
  }

  /// Throw the staged export away.
  pub fn abort(mut self) -> Result<()> {
    self.committed = true;
    remove_dir_if_exists(&self.staging)
  }
}

impl Drop for ExportDir {
  fn drop(&mut self) {
    if !self.committed {
      if let Err(e) = remove_dir_if_exists(&self.staging) {
        tracing::warn!(error = %e, "failed to remove staging directory");
      }
    }
  }
}

// ─── Partition writing ───────────────────────────────────────────────────────

/// A partition's data file, written batch by batch.
///
/// Row groups are cut at `row_group_size` rows regardless of how the rows
/// are split across [`write`](PartitionWriter::write) calls.
pub struct PartitionWriter {
  path:   PathBuf,
  writer: ArrowWriter<File>,
  rows:   usize,
}

impl PartitionWriter {
  /// Create `<root>/dataSource=<v>/year=<YYYY>/month=<MM>/data_0.parquet`.
  /// Fails with [`Error::PartitionExists`] rather than replace a file an
  /// earlier partition wrote.
  pub fn create(
    root: &Path,
    key: &PartitionKey,
    options: ExportOptions,
  ) -> Result<Self> {
    let dir = root.join(key.relative_dir());
    std::fs::create_dir_all(&dir).map_err(Error::io(&dir))?;
    let path = dir.join(DATA_FILE);

    let props = WriterProperties::builder()
      .set_compression(Compression::SNAPPY)
      .set_max_row_group_size(options.row_group_size.max(1))
      .build();

    let file = match File::create_new(&path) {
      Ok(file) => file,
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
        return Err(Error::PartitionExists(path));
      }
      Err(e) => return Err(Error::io(&path)(e)),
    };
    let writer = ArrowWriter::try_new(file, batch::schema(), Some(props))?;
    Ok(Self { path, writer, rows: 0 })
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Rows written so far.
  pub fn rows(&self) -> usize { self.rows }

  pub fn write(&mut self, rows: &[ConsolidatedGame]) -> Result<()> {
    if rows.is_empty() {
      return Ok(());
    }
    self.writer.write(&batch::to_record_batch(rows)?)?;
    self.rows += rows.len();
    Ok(())
  }

  /// Flush the last row group and the footer, returning the file's path.
  pub fn finish(self) -> Result<PathBuf> {
    self.writer.close()?;
    tracing::debug!(path = %self.path.display(), rows = self.rows, "partition written");
    Ok(self.path)
  }
}

/// Write one partition's rows in a single call. See [`PartitionWriter`].
pub fn write_partition(
  root: &Path,
  key: &PartitionKey,
  rows: &[ConsolidatedGame],
  options: ExportOptions,
) -> Result<PathBuf> {
  let mut writer = PartitionWriter::create(root, key, options)?;
  writer.write(rows)?;
  writer.finish()
}

#[cfg(test)]
mod tests {
  use arrow_array::{Array, Int32Array, StringArray};
  use chrono::NaiveDate;
  use parquet::{
    arrow::arrow_reader::ParquetRecordBatchReaderBuilder,
    file::reader::{FileReader, SerializedFileReader},
  };

  use super::*;
  use crate::batch::tests::row;

  fn key(ds: Option<&str>, year: i32, month: u32) -> PartitionKey {
    PartitionKey::new(ds.map(str::to_owned), year, month).unwrap()
  }

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn read_back(path: &Path) -> Vec<arrow_array::RecordBatch> {
    let file = File::open(path).unwrap();
    ParquetRecordBatchReaderBuilder::try_new(file)
      .unwrap()
      .build()
      .unwrap()
      .collect::<std::result::Result<Vec<_>, _>>()
      .unwrap()
  }

  #[test]
  fn partition_is_written_under_hive_path() {
    let tmp = tempfile::tempdir().unwrap();
    let rows = [
      row(date(2013, 1, 1), Some("King's Pawn Game")),
      row(date(2013, 1, 31), None),
    ];
    let path = write_partition(
      tmp.path(),
      &key(Some("lichess"), 2013, 1),
      &rows,
      ExportOptions::default(),
    )
    .unwrap();

    assert_eq!(
      path,
      tmp
        .path()
        .join("dataSource=lichess/year=2013/month=01/data_0.parquet")
    );

    let batches = read_back(&path);
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total, 2);

    let batch = &batches[0];
    let openings = batch
      .column_by_name("opening")
      .unwrap()
      .as_any()
      .downcast_ref::<StringArray>()
      .unwrap();
    assert_eq!(openings.value(0), "King's Pawn Game");
    assert!(openings.is_null(1));

    let elo = batch
      .column_by_name("WhiteElo")
      .unwrap()
      .as_any()
      .downcast_ref::<Int32Array>()
      .unwrap();
    assert_eq!(elo.value(0), 2100);
  }

  #[test]
  fn null_data_source_uses_default_partition() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_partition(
      tmp.path(),
      &key(None, 2014, 12),
      &[row(date(2014, 12, 25), None)],
      ExportOptions::default(),
    )
    .unwrap();
    assert!(path.ends_with(
      "dataSource=__HIVE_DEFAULT_PARTITION__/year=2014/month=12/data_0.parquet"
    ));
  }

  #[test]
  fn row_groups_respect_configured_size() {
    let tmp = tempfile::tempdir().unwrap();
    let rows: Vec<_> = (1..=5).map(|d| row(date(2013, 1, d), None)).collect();
    let path = write_partition(
      tmp.path(),
      &key(Some("lichess"), 2013, 1),
      &rows,
      ExportOptions { row_group_size: 2 },
    )
    .unwrap();

    let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
    let meta = reader.metadata();
    assert_eq!(meta.num_row_groups(), 3);
    assert_eq!(meta.file_metadata().num_rows(), 5);
  }

  #[test]
  fn batches_share_row_groups() {
    let tmp = tempfile::tempdir().unwrap();
    let mut writer = PartitionWriter::create(
      tmp.path(),
      &key(Some("lichess"), 2013, 1),
      ExportOptions { row_group_size: 4 },
    )
    .unwrap();
    for d in [1, 4] {
      let rows: Vec<_> = (d..d + 3).map(|d| row(date(2013, 1, d), None)).collect();
      writer.write(&rows).unwrap();
    }
    writer.write(&[]).unwrap();
    assert_eq!(writer.rows(), 6);
    let path = writer.finish().unwrap();

    let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
    let meta = reader.metadata();
    assert_eq!(meta.file_metadata().num_rows(), 6);
    assert_eq!(meta.num_row_groups(), 2);
    assert_eq!(meta.row_group(0).num_rows(), 4);
  }

  #[test]
  fn existing_partition_file_is_not_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let first = write_partition(
      tmp.path(),
      &key(None, 2013, 1),
      &[row(date(2013, 1, 1), None), row(date(2013, 1, 2), None)],
      ExportOptions::default(),
    )
    .unwrap();

    let err = write_partition(
      tmp.path(),
      &key(Some(""), 2013, 1),
      &[row(date(2013, 1, 3), None)],
      ExportOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(&err, Error::PartitionExists(p) if *p == first), "{err}");

    let reader = SerializedFileReader::new(File::open(&first).unwrap()).unwrap();
    assert_eq!(reader.metadata().file_metadata().num_rows(), 2);
  }

  #[test]
  fn commit_replaces_previous_contents() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("parquet");
    std::fs::create_dir_all(out.join("dataSource=stale")).unwrap();
    std::fs::write(out.join("dataSource=stale/old.parquet"), b"x").unwrap();

    let export = ExportDir::stage(&out).unwrap();
    write_partition(
      export.staging_dir(),
      &key(Some("lichess"), 2013, 1),
      &[row(date(2013, 1, 1), None)],
      ExportOptions::default(),
    )
    .unwrap();
    export.commit().unwrap();

    assert!(!out.join("dataSource=stale").exists());
    assert!(
      out
        .join("dataSource=lichess/year=2013/month=01/data_0.parquet")
        .is_file()
    );
    assert!(!tmp.path().join("parquet.staging").exists());
    assert!(!tmp.path().join("parquet.previous").exists());
  }

  #[test]
  fn commit_creates_missing_target() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("nested").join("parquet");
    let export = ExportDir::stage(&out).unwrap();
    export.commit().unwrap();
    assert!(out.is_dir());
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
  }

  #[test]
  fn abandoned_export_leaves_target_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("parquet");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("keep.txt"), b"keep").unwrap();

    {
      let export = ExportDir::stage(&out).unwrap();
      write_partition(
        export.staging_dir(),
        &key(Some("lichess"), 2013, 1),
        &[row(date(2013, 1, 1), None)],
        ExportOptions::default(),
      )
      .unwrap();
    }

    assert!(out.join("keep.txt").is_file());
    assert!(!tmp.path().join("parquet.staging").exists());

    let export = ExportDir::stage(&out).unwrap();
    export.abort().unwrap();
    assert!(out.join("keep.txt").is_file());
    assert!(!tmp.path().join("parquet.staging").exists());
  }

  #[test]
  fn stale_staging_is_discarded() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("parquet");
    let stale = tmp.path().join("parquet.staging/dataSource=old");
    std::fs::create_dir_all(&stale).unwrap();

    let export = ExportDir::stage(&out).unwrap();
    assert!(!stale.exists());
    export.commit().unwrap();
    assert!(!out.join("dataSource=old").exists());
  }
}
