//! [`SqliteGameStore`] — the SQLite implementation of [`GameStore`].

use std::path::Path;

use chessvault_core::{
  game::{DataSource, GameRecord},
  store::{GameStore, OpeningAssignment, PendingGame},
};
use rusqlite::OpenFlags;

use crate::{
  Error, Result,
  encode::{RawGame, encode_date, table_columns},
  schema::{DATA_SOURCE_COLUMN, GAMES_SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// One per-source game store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteGameStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteGameStore {
  /// Open an existing store for reading and writing. Fails if the file does
  /// not exist or has no `games` table.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(Error::NotFound(path.to_path_buf()));
    }
    let conn = tokio_rusqlite::Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    let store = Self { conn };
    if store.columns().await?.is_empty() {
      return Err(Error::MissingTable("games"));
    }
    Ok(store)
  }

  /// Create (or open) a store at `path` with the `games` table in place.
  /// This is the entry point for ingestion.
  pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Flush and close the underlying connection.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(GAMES_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn columns(&self) -> Result<Vec<String>> {
    Ok(
      self
        .conn
        .call(|conn| Ok(table_columns(conn, "main", "games")?))
        .await?,
    )
  }
}

// ─── GameStore impl ──────────────────────────────────────────────────────────

impl GameStore for SqliteGameStore {
  type Error = Error;

  async fn insert_games(&self, games: Vec<GameRecord>) -> Result<usize> {
    let count = games.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO games (
               event, site, white, black, result, white_title, black_title,
               white_elo, black_elo, utc_date, utc_time, time_control, source,
               movetext, clean_movetext, eco, opening, parse_error
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                       ?14, ?15, ?16, ?17, ?18)",
          )?;
          for g in games {
            stmt.execute(rusqlite::params![
              g.event,
              g.site,
              g.white,
              g.black,
              g.result,
              g.white_title,
              g.black_title,
              g.white_elo,
              g.black_elo,
              g.utc_date.map(encode_date),
              g.utc_time,
              g.time_control,
              g.source,
              g.movetext,
              g.clean_movetext,
              g.eco,
              g.opening,
              g.parse_error,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(count)
  }

  async fn pending_games(
    &self,
    after: i64,
    limit: usize,
  ) -> Result<Vec<PendingGame>> {
    let limit = i64::try_from(limit.max(1)).unwrap_or(i64::MAX);
    let pending = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT rowid, clean_movetext FROM games
           WHERE rowid > ?1
             AND opening IS NULL
             AND parse_error IS NULL
             AND clean_movetext IS NOT NULL
           ORDER BY rowid
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![after, limit], |row| {
            Ok(PendingGame {
              game_id:        row.get(0)?,
              clean_movetext: row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(pending)
  }

  async fn tag_source(&self, data_source: DataSource) -> Result<usize> {
    let label = data_source.as_str().to_owned();

    let tagged = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let columns = table_columns(&tx, "main", "games")?;
        if !columns.iter().any(|c| c == DATA_SOURCE_COLUMN) {
          tx.execute_batch("ALTER TABLE games ADD COLUMN data_source TEXT")?;
        }
        let tagged = tx.execute(
          "UPDATE games SET data_source = ?1",
          rusqlite::params![label],
        )?;
        tx.commit()?;
        Ok(tagged)
      })
      .await?;

    tracing::debug!(tagged, "data source written");
    Ok(tagged)
  }

  async fn apply_openings(
    &self,
    assignments: Vec<OpeningAssignment>,
  ) -> Result<usize> {
    let classified = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut classified = 0;
        {
          let mut stmt = tx.prepare(
            "UPDATE games SET eco = ?1, opening = ?2
             WHERE rowid = ?3 AND opening IS NULL AND parse_error IS NULL",
          )?;
          for a in &assignments {
            classified +=
              stmt.execute(rusqlite::params![a.eco, a.opening, a.game_id])?;
          }
        }
        tx.commit()?;
        Ok(classified)
      })
      .await?;

    tracing::debug!(classified, "openings committed");
    Ok(classified)
  }

  async fn list_games(&self) -> Result<Vec<GameRecord>> {
    let raws: Vec<RawGame> = self
      .conn
      .call(|conn| {
        let columns = table_columns(conn, "main", "games")?;
        let has_data_source = columns.iter().any(|c| c == DATA_SOURCE_COLUMN);
        let sql = format!(
          "SELECT {} FROM games ORDER BY rowid",
          RawGame::select_list(has_data_source)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawGame::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGame::into_game).collect()
  }
}
