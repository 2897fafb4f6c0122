//! Loading and writing the opening catalogue.

use std::path::Path;

use chessvault_core::opening::{Catalogue, OpeningEntry};
use rusqlite::OpenFlags;

use crate::{Error, Result, schema::OPENINGS_SCHEMA};

/// Load the `openings` table at `path`, read-only, in row order.
pub async fn load_catalogue(path: impl AsRef<Path>) -> Result<Catalogue> {
  let path = path.as_ref();
  if !path.is_file() {
    return Err(Error::NotFound(path.to_path_buf()));
  }

  let conn = tokio_rusqlite::Connection::open_with_flags(
    path,
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
  )
  .await?;

  let entries: Vec<OpeningEntry> = conn
    .call(|conn| {
      let mut stmt =
        conn.prepare("SELECT eco, name, uci, pgn FROM openings ORDER BY rowid")?;
      let rows = stmt
        .query_map([], |row| {
          Ok(OpeningEntry {
            eco:  row.get(0)?,
            name: row.get(1)?,
            uci:  row.get(2)?,
            pgn:  row.get(3)?,
          })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
  conn.close().await?;

  tracing::debug!(path = %path.display(), openings = entries.len(), "catalogue read");
  Ok(Catalogue::new(entries)?)
}

/// Write `entries`, in order, to a catalogue database at `path`.
pub async fn write_catalogue(
  path: impl AsRef<Path>,
  entries: Vec<OpeningEntry>,
) -> Result<()> {
  let conn = tokio_rusqlite::Connection::open(path).await?;
  conn
    .call(move |conn| {
      let tx = conn.transaction()?;
      tx.execute_batch(OPENINGS_SCHEMA)?;
      {
        let mut stmt = tx.prepare(
          "INSERT INTO openings (eco, name, uci, pgn) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for e in &entries {
          stmt.execute(rusqlite::params![e.eco, e.name, e.uci, e.pgn])?;
        }
      }
      tx.commit()?;
      Ok(())
    })
    .await?;
  conn.close().await?;
  Ok(())
}
