//! [`CombinedTable`] — the working table consolidation merges stores into.
//!
//! Stores are folded in one at a time: each is attached read-only under the
//! `src` alias, its filtered projection is appended, and it is detached
//! again. Partition keys are derived by SQLite from `utc_date` during the
//! append.

use std::path::{Path, PathBuf};

use chessvault_core::{
  game::{ConsolidatedGame, DataSource},
  partition::{NULL_PARTITION, PartitionKey},
};

use crate::{
  Error, Result,
  encode::{RawConsolidated, RawPartitionCount, readonly_uri, table_columns},
  schema::{COMBINED_INDEX, COMBINED_SCHEMA, DATA_SOURCE_COLUMN, PROJECTED_COLUMNS},
};

const ALIAS: &str = "src";

/// One page of a partition read by [`CombinedTable::partition_page`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowPage {
  pub rows:       Vec<ConsolidatedGame>,
  /// Row id of the last row in the page, `None` when the page is empty.
  pub last_rowid: Option<i64>,
}

/// Row count of one partition of the combined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionCount {
  pub key:  PartitionKey,
  pub rows: usize,
}

/// The combined working table, backed by a SQLite file owned by one
/// consolidation run.
pub struct CombinedTable {
  conn: tokio_rusqlite::Connection,
  path: PathBuf,
}

impl CombinedTable {
  /// Delete whatever database is at `path` and start an empty combined table
  /// there.
  pub async fn recreate(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    for suffix in ["", "-wal", "-shm", "-journal"] {
      let mut file = path.clone().into_os_string();
      file.push(suffix);
      match tokio::fs::remove_file(&file).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
      }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await?;
    }

    let conn = tokio_rusqlite::Connection::open(&path).await?;
    conn
      .call(|conn| {
        conn.execute_batch(COMBINED_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, path })
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Append the exportable games of the store at `store`.
  ///
  /// Rows with a parse error, without a date, or dated before `min_year` are
  /// skipped. With `data_source` set, every appended row carries that label;
  /// otherwise rows keep the store's own `data_source`.
  pub async fn append_store(
    &self,
    store: &Path,
    data_source: Option<&DataSource>,
    min_year: i32,
  ) -> Result<usize> {
    if !store.is_file() {
      return Err(Error::NotFound(store.to_path_buf()));
    }

    let uri = readonly_uri(store);
    self
      .conn
      .call(move |conn| {
        conn.execute(&format!("ATTACH DATABASE ?1 AS {ALIAS}"), [uri])?;
        Ok(())
      })
      .await?;

    let appended = self.append_attached(data_source, min_year).await;

    self
      .conn
      .call(|conn| {
        conn.execute(&format!("DETACH DATABASE {ALIAS}"), [])?;
        Ok(())
      })
      .await?;

    appended
  }

  async fn append_attached(
    &self,
    data_source: Option<&DataSource>,
    min_year: i32,
  ) -> Result<usize> {
    let columns = self
      .conn
      .call(|conn| Ok(table_columns(conn, ALIAS, "games")?))
      .await?;
    if columns.is_empty() {
      return Err(Error::MissingTable("games"));
    }
    let required = PROJECTED_COLUMNS
      .iter()
      .chain(data_source.is_none().then_some(&DATA_SOURCE_COLUMN));
    for &column in required {
      if !columns.iter().any(|c| c == column) {
        return Err(Error::MissingColumn {
          table: "games",
          column,
        });
      }
    }

    // Blank labels and the null marker are stored as NULL so that every
    // group renders to its own partition directory.
    let (source_expr, label) = match data_source {
      Some(d) => ("?2".to_owned(), d.as_str().to_owned()),
      None => (
        format!("NULLIF(NULLIF(TRIM({DATA_SOURCE_COLUMN}), ''), ?2)"),
        NULL_PARTITION.to_owned(),
      ),
    };
    let appended = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "INSERT INTO combined (
             event, site, white, black, result, white_title, black_title,
             white_elo, black_elo, utc_date, utc_time, time_control, source,
             eco, opening, clean_movetext, data_source, year, month
           )
           SELECT
             event, site, white, black, result, white_title, black_title,
             white_elo, black_elo, utc_date, utc_time, time_control, source,
             eco, opening, clean_movetext, {source_expr},
             CAST(strftime('%Y', utc_date) AS INTEGER),
             strftime('%m', utc_date)
           FROM {ALIAS}.games
           WHERE parse_error IS NULL
             AND strftime('%Y', utc_date) IS NOT NULL
             AND CAST(strftime('%Y', utc_date) AS INTEGER) >= ?1
           ORDER BY rowid"
        );
        Ok(conn.execute(&sql, rusqlite::params![min_year, label])?)
      })
      .await?;

    Ok(appended)
  }

  /// Index the partition columns. Call once, after the last append.
  pub async fn finish(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(COMBINED_INDEX)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Total number of rows.
  pub async fn row_count(&self) -> Result<usize> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM combined", [], |r| r.get(0))?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }

  /// Row counts per `(data_source, year, month)`, in key order.
  pub async fn partition_counts(&self) -> Result<Vec<PartitionCount>> {
    let raws: Vec<RawPartitionCount> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT data_source, year, month, COUNT(*)
           FROM combined
           GROUP BY data_source, year, month
           ORDER BY data_source, year, month",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawPartitionCount {
              data_source: row.get(0)?,
              year:        row.get(1)?,
              month:       row.get(2)?,
              rows:        row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| {
        let (key, rows) = raw.into_key()?;
        Ok(PartitionCount { key, rows })
      })
      .collect()
  }

  /// Up to `limit` rows of one partition with a row id above `after`, in
  /// merge order. Start from `after = 0` and continue from
  /// [`RowPage::last_rowid`] until a page comes back short.
  pub async fn partition_page(
    &self,
    key: &PartitionKey,
    after: i64,
    limit: usize,
  ) -> Result<RowPage> {
    let data_source = key.data_source.clone();
    let year = key.year;
    let month = key.month_label();
    let limit = i64::try_from(limit.max(1)).unwrap_or(i64::MAX);

    let raws: Vec<(i64, RawConsolidated)> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {}, rowid FROM combined
           WHERE data_source IS ?1 AND year = ?2 AND month = ?3 AND rowid > ?4
           ORDER BY rowid
           LIMIT ?5",
          RawConsolidated::SELECT_LIST
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![data_source, year, month, after, limit],
            |row| Ok((row.get(19)?, RawConsolidated::from_row(row)?)),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let last_rowid = raws.last().map(|(id, _)| *id);
    let rows = raws
      .into_iter()
      .map(|(_, raw)| raw.into_consolidated())
      .collect::<Result<Vec<_>>>()?;
    Ok(RowPage { rows, last_rowid })
  }

  /// Flush and close the underlying connection.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }
}
