//! Consolidation: merge enriched stores and export them partitioned.
//!
//! Stores are appended to the combined working table one by one, in path
//! order. The export is then written partition by partition into a staging
//! directory that replaces the output directory only once every partition
//! has been written.

use std::path::{Path, PathBuf};

use chessvault_core::game::DataSource;
use chessvault_parquet::{ExportDir, PartitionWriter};
use chessvault_store_sqlite::{CombinedTable, PartitionCount};

use crate::{
  Error, Result,
  config::PipelineConfig,
  discover::{StoreFile, discover_stores},
};

#[derive(Debug, Clone)]
pub struct ConsolidateRequest {
  pub in_dir:      PathBuf,
  pub out_dir:     PathBuf,
  /// Where the combined working table lives. Recreated on every run.
  pub out_db:      PathBuf,
  /// Overrides every store's own provenance label.
  pub data_source: Option<DataSource>,
}

/// Rows one store contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedStore {
  pub relative: PathBuf,
  pub rows:     usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidateReport {
  pub stores:     Vec<MergedStore>,
  /// Row counts per partition, in key order.
  pub partitions: Vec<PartitionCount>,
  pub total_rows: usize,
  /// The committed export directory.
  pub out_dir:    PathBuf,
}

/// Stores under `in_dir`, minus the working table itself when it happens to
/// live there.
fn input_stores(req: &ConsolidateRequest, extension: &str) -> Result<Vec<StoreFile>> {
  let out_db = std::path::absolute(&req.out_db).ok();
  let stores: Vec<_> = discover_stores(&req.in_dir, extension)?
    .into_iter()
    .filter(|s| std::path::absolute(&s.path).ok() != out_db)
    .collect();
  if stores.is_empty() {
    return Err(Error::NoInputFound {
      dir: req.in_dir.clone(),
    });
  }
  Ok(stores)
}

async fn merge(
  table: &CombinedTable,
  stores: &[StoreFile],
  data_source: Option<&DataSource>,
  min_year: i32,
) -> Result<Vec<MergedStore>> {
  let mut merged = Vec::with_capacity(stores.len());
  for store in stores {
    let rows = table
      .append_store(&store.path, data_source, min_year)
      .await
      .map_err(Error::store_schema(&store.path))?;
    tracing::info!(store = %store.relative.display(), rows, "store merged");
    merged.push(MergedStore {
      relative: store.relative.clone(),
      rows,
    });
  }
  table
    .finish()
    .await
    .map_err(Error::store_access(table.path()))?;
  Ok(merged)
}

/// Run blocking export work off the async runtime.
async fn blocking<T, F>(out_dir: &Path, work: F) -> Result<T>
where
  T: Send + 'static,
  F: FnOnce() -> chessvault_parquet::Result<T> + Send + 'static,
{
  tokio::task::spawn_blocking(work)
    .await
    .map_err(Error::export_write(out_dir))?
    .map_err(Error::export_write(out_dir))
}

async fn export_partition(
  table: &CombinedTable,
  partition: &PartitionCount,
  root: PathBuf,
  out_dir: &Path,
  config: &PipelineConfig,
) -> Result<PathBuf> {
  let options = config.export_options();
  let batch_size = config.batch_size();
  let key = partition.key.clone();
  let mut writer =
    blocking(out_dir, move || PartitionWriter::create(&root, &key, options))
      .await?;

  let mut after = 0;
  loop {
    let page = table
      .partition_page(&partition.key, after, batch_size)
      .await
      .map_err(Error::store_access(table.path()))?;
    let Some(last) = page.last_rowid else { break };
    after = last;
    let full = page.rows.len() == batch_size;
    writer = blocking(out_dir, move || {
      writer.write(&page.rows)?;
      Ok(writer)
    })
    .await?;
    if !full {
      break;
    }
  }

  blocking(out_dir, move || writer.finish()).await
}

async fn export(
  table: &CombinedTable,
  partitions: &[PartitionCount],
  out_dir: &Path,
  config: &PipelineConfig,
) -> Result<PathBuf> {
  let staged = ExportDir::stage(out_dir).map_err(Error::export_write(out_dir))?;

  for partition in partitions {
    let root = staged.staging_dir().to_path_buf();
    let written = export_partition(table, partition, root, out_dir, config).await?;
    tracing::debug!(path = %written.display(), rows = partition.rows, "partition exported");
  }

  staged.commit().map_err(Error::export_write(out_dir))
}

/// Merge every store under `req.in_dir` into the combined table at
/// `req.out_db` and export it to `req.out_dir`, replacing whatever was there.
pub async fn consolidate(
  req: &ConsolidateRequest,
  config: &PipelineConfig,
) -> Result<ConsolidateReport> {
  let stores = input_stores(req, &config.store_extension)?;
  tracing::info!(
    stores = stores.len(),
    data_source = ?req.data_source.as_ref().map(DataSource::as_str),
    min_year = config.min_year,
    "consolidating stores"
  );

  let table = CombinedTable::recreate(&req.out_db)
    .await
    .map_err(Error::store_access(&req.out_db))?;
  let merged =
    merge(&table, &stores, req.data_source.as_ref(), config.min_year).await?;

  let partitions = table
    .partition_counts()
    .await
    .map_err(Error::store_access(&req.out_db))?;
  let total_rows = table
    .row_count()
    .await
    .map_err(Error::store_access(&req.out_db))?;

  let out_dir = export(&table, &partitions, &req.out_dir, config).await?;
  table
    .close()
    .await
    .map_err(Error::store_access(&req.out_db))?;

  tracing::info!(
    partitions = partitions.len(),
    rows = total_rows,
    out_dir = %out_dir.display(),
    "export committed"
  );

  Ok(ConsolidateReport {
    stores: merged,
    partitions,
    total_rows,
    out_dir,
  })
}
