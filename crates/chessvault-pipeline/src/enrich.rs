//! Source enrichment: provenance tagging plus opening classification.
//!
//! Each input store is copied to `<out>/<rel>.partial`, enriched in place,
//! closed, and renamed to `<out>/<rel>`. The input is never written to, and a
//! store that fails leaves no output behind from this run.

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
  sync::Arc,
};

use chessvault_core::{
  classify::Classifier,
  game::DataSource,
  store::{EnrichmentSummary, GameStore},
};
use chessvault_store_sqlite::{SqliteGameStore, load_catalogue};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
  Error, Result,
  config::PipelineConfig,
  discover::{StoreFile, discover_stores},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ─── Requests and reports ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EnrichRequest {
  pub in_dir:      PathBuf,
  pub out_dir:     PathBuf,
  pub openings_db: PathBuf,
  /// Label for every store. When absent each store is labelled from its
  /// location under `in_dir`.
  pub data_source: Option<DataSource>,
}

/// What enrichment did to one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReport {
  pub relative:    PathBuf,
  pub output:      PathBuf,
  pub data_source: DataSource,
  /// Games that had no opening before this run.
  pub pending:     usize,
  pub summary:     EnrichmentSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
  /// One entry per store, in path order.
  pub stores: Vec<StoreReport>,
}

impl EnrichReport {
  pub fn tagged(&self) -> usize {
    self.stores.iter().map(|s| s.summary.tagged).sum()
  }

  pub fn pending(&self) -> usize { self.stores.iter().map(|s| s.pending).sum() }

  pub fn classified(&self) -> usize {
    self.stores.iter().map(|s| s.summary.classified).sum()
  }
}

// ─── One store ───────────────────────────────────────────────────────────────

/// Label every game in `store` with `data_source` and classify the games
/// that have no opening yet, `batch_size` at a time. Returns the number of
/// pending games alongside what was written.
pub async fn enrich_source<S: GameStore>(
  store: &S,
  classifier: Arc<Classifier>,
  data_source: DataSource,
  batch_size: usize,
) -> Result<(usize, EnrichmentSummary), BoxError> {
  let batch_size = batch_size.max(1);
  let tagged = store.tag_source(data_source).await?;

  let mut pending = 0;
  let mut classified = 0;
  let mut after = 0;
  loop {
    let page = store.pending_games(after, batch_size).await?;
    let Some(last) = page.last() else { break };
    after = last.game_id;
    pending += page.len();
    let full = page.len() == batch_size;

    let classifier = Arc::clone(&classifier);
    let assignments =
      tokio::task::spawn_blocking(move || classifier.assign(&page)).await?;
    classified += store.apply_openings(assignments).await?;
    if !full {
      break;
    }
  }
  tracing::debug!(pending, classified, "classification finished");

  Ok((pending, EnrichmentSummary { tagged, classified }))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
  let mut s = OsString::from(path.as_os_str());
  s.push(suffix);
  PathBuf::from(s)
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
  match tokio::fs::remove_file(path).await {
    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}

/// A store copy being enriched. Dropped before [`keep`](Self::keep), it
/// deletes the copy and its rollback journal.
struct PartialFile {
  path: PathBuf,
  kept: bool,
}

impl PartialFile {
  fn new(path: PathBuf) -> Self { Self { path, kept: false } }

  fn keep(mut self) { self.kept = true; }
}

impl Drop for PartialFile {
  fn drop(&mut self) {
    if self.kept {
      return;
    }
    for path in [self.path.clone(), with_suffix(&self.path, "-journal")] {
      match std::fs::remove_file(&path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
          tracing::warn!(path = %path.display(), error = %e, "failed to remove partial store");
        }
        _ => {}
      }
    }
  }
}

/// Reject an output directory that is the input directory or one of its
/// ancestors.
fn check_output_dir(req: &EnrichRequest) -> Result<()> {
  fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
      .or_else(|_| std::path::absolute(path))
      .unwrap_or_else(|_| path.to_path_buf())
  }
  if resolved(&req.in_dir).starts_with(resolved(&req.out_dir)) {
    return Err(Error::OutputOverlapsInput {
      in_dir:  req.in_dir.clone(),
      out_dir: req.out_dir.clone(),
    });
  }
  Ok(())
}

async fn enrich_store_file(
  store: StoreFile,
  out_dir: PathBuf,
  classifier: Arc<Classifier>,
  label: Option<DataSource>,
  batch_size: usize,
) -> Result<StoreReport> {
  let data_source = match label {
    Some(label) => label,
    None => store.default_label()?,
  };
  let output = out_dir.join(&store.relative);
  let partial = with_suffix(&output, ".partial");

  if let Some(parent) = output.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(Error::store_access(parent))?;
  }
  for stale in [partial.clone(), with_suffix(&partial, "-journal")] {
    remove_if_exists(&stale)
      .await
      .map_err(Error::store_access(&stale))?;
  }
  let guard = PartialFile::new(partial.clone());
  tokio::fs::copy(&store.path, &partial)
    .await
    .map_err(Error::store_access(&store.path))?;

  let enriched: Result<_, BoxError> = async {
    let db = SqliteGameStore::open(&partial).await?;
    let outcome =
      enrich_source(&db, classifier, data_source.clone(), batch_size).await;
    db.close().await?;
    outcome
  }
  .await;

  let (pending, summary) = enriched.map_err(|source| Error::StoreAccess {
    path: store.path.clone(),
    source,
  })?;

  tokio::fs::rename(&partial, &output)
    .await
    .map_err(Error::store_access(&output))?;
  guard.keep();

  tracing::info!(
    store = %store.relative.display(),
    data_source = %data_source,
    tagged = summary.tagged,
    pending,
    classified = summary.classified,
    "store enriched"
  );

  Ok(StoreReport {
    relative: store.relative,
    output,
    data_source,
    pending,
    summary,
  })
}

// ─── All stores ──────────────────────────────────────────────────────────────

/// Enrich every store under `req.in_dir` into `req.out_dir`, up to
/// `config.jobs()` at a time. After the first failure no further store is
/// started; stores already running are finished before the error is returned.
pub async fn enrich(
  req: &EnrichRequest,
  config: &PipelineConfig,
) -> Result<EnrichReport> {
  check_output_dir(req)?;
  let catalogue =
    load_catalogue(&req.openings_db)
      .await
      .map_err(|source| Error::MissingCatalogue {
        path: req.openings_db.clone(),
        source,
      })?;
  let stores = discover_stores(&req.in_dir, &config.store_extension)?;

  let classifier = Arc::new(Classifier::new(catalogue, config.match_mode));
  tracing::info!(
    stores = stores.len(),
    openings = classifier.catalogue().len(),
    mode = ?classifier.mode(),
    "enriching stores"
  );

  let permits = Arc::new(Semaphore::new(config.jobs()));
  let mut tasks = JoinSet::new();
  for store in stores {
    let permits = Arc::clone(&permits);
    let out_dir = req.out_dir.clone();
    let classifier = Arc::clone(&classifier);
    let label = req.data_source.clone();
    let batch_size = config.batch_size();
    tasks.spawn(async move {
      // Closed once a store fails.
      let Ok(_permit) = permits.acquire_owned().await else {
        return Ok(None);
      };
      enrich_store_file(store, out_dir, classifier, label, batch_size)
        .await
        .map(Some)
    });
  }

  let mut report = EnrichReport::default();
  let mut failure = None;
  while let Some(joined) = tasks.join_next().await {
    let outcome = match joined {
      Ok(outcome) => outcome,
      Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
      Err(e) => Err(Error::StoreAccess {
        path:   req.in_dir.clone(),
        source: Box::new(e),
      }),
    };
    match outcome {
      Ok(Some(store)) => report.stores.push(store),
      Ok(None) => {}
      Err(e) => {
        permits.close();
        failure.get_or_insert(e);
      }
    }
  }
  if let Some(e) = failure {
    return Err(e);
  }

  report.stores.sort_by(|a, b| a.relative.cmp(&b.relative));
  Ok(report)
}

#[cfg(test)]
mod tests {
  use chessvault_core::{
    classify::MatchMode,
    game::GameRecord,
    opening::{Catalogue, OpeningEntry},
  };
  use chessvault_store_sqlite::write_catalogue;
  use chrono::NaiveDate;
  use tempfile::TempDir;

  use super::*;

  fn opening(eco: &str, name: &str, uci: &str, pgn: &str) -> OpeningEntry {
    OpeningEntry {
      eco:  eco.into(),
      name: name.into(),
      uci:  uci.into(),
      pgn:  pgn.into(),
    }
  }

  fn openings() -> Vec<OpeningEntry> {
    vec![
      opening("C20", "King's Pawn Game", "e2e4 e7e5", "1. e4 e5"),
      opening(
        "C40",
        "King's Knight Opening",
        "e2e4 e7e5 g1f3",
        "1. e4 e5 2. Nf3",
      ),
      opening("D00", "Queen's Pawn Game", "d2d4 d7d5", "1. d4 d5"),
    ]
  }

  fn game(movetext: &str) -> GameRecord {
    GameRecord {
      white: Some("alice".into()),
      black: Some("bob".into()),
      utc_date: NaiveDate::from_ymd_opt(2013, 1, 1),
      movetext: Some(movetext.into()),
      clean_movetext: Some(movetext.into()),
      ..GameRecord::default()
    }
  }

  async fn write_store(path: &Path, games: Vec<GameRecord>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let store = SqliteGameStore::create(path).await.unwrap();
    store.insert_games(games).await.unwrap();
    store.close().await.unwrap();
  }

  async fn read_store(path: &Path) -> Vec<GameRecord> {
    let store = SqliteGameStore::open(path).await.unwrap();
    let games = store.list_games().await.unwrap();
    store.close().await.unwrap();
    games
  }

  struct Fixture {
    _tmp: TempDir,
    req:  EnrichRequest,
  }

  async fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write_catalogue(root.join("openings.db"), openings())
      .await
      .unwrap();

    let mut broken = game("1. e4 e5");
    broken.parse_error = Some("illegal move".into());
    write_store(&root.join("in/lichess/2013-01.db"), vec![
      game("1. e4 e5 2. Nf3 Nc6 3. Bb5"),
      game("1. d4 d5 2. c4"),
      game("1. a3 a6"),
      broken,
    ])
    .await;
    write_store(&root.join("in/twic.db"), vec![game("1. e4 e5 2. f4")]).await;

    let req = EnrichRequest {
      in_dir:      root.join("in"),
      out_dir:     root.join("out"),
      openings_db: root.join("openings.db"),
      data_source: None,
    };
    Fixture { _tmp: tmp, req }
  }

  #[tokio::test]
  async fn enrich_source_tags_and_classifies() {
    let store = SqliteGameStore::open_in_memory().await.unwrap();
    store
      .insert_games(vec![game("1. e4 e5 2. Nf3 Nc6"), game("1. h4 h5")])
      .await
      .unwrap();
    let classifier = Arc::new(Classifier::new(
      Catalogue::new(openings()).unwrap(),
      MatchMode::Contains,
    ));

    let label = DataSource::new("lichess").unwrap();
    let (pending, summary) =
      enrich_source(&store, Arc::clone(&classifier), label.clone(), 100)
        .await
        .unwrap();
    assert_eq!(pending, 2);
    assert_eq!(summary, EnrichmentSummary {
      tagged:     2,
      classified: 1,
    });

    let games = store.list_games().await.unwrap();
    assert_eq!(games[0].opening.as_deref(), Some("King's Knight Opening"));
    assert_eq!(games[0].eco.as_deref(), Some("C40"));
    assert_eq!(games[1].opening, None);
    assert!(games.iter().all(|g| g.data_source.as_ref() == Some(&label)));

    // A second pass finds only the unmatched game and labels nothing new.
    let (pending, summary) =
      enrich_source(&store, classifier, label, 100).await.unwrap();
    assert_eq!(pending, 1);
    assert_eq!(summary.classified, 0);
    assert_eq!(store.list_games().await.unwrap(), games);
  }

  #[tokio::test]
  async fn enrich_writes_mirrored_outputs_and_keeps_inputs() {
    let f = fixture().await;
    let input = f.req.in_dir.join("lichess/2013-01.db");
    let before = std::fs::read(&input).unwrap();

    let report = enrich(&f.req, &PipelineConfig::default()).await.unwrap();

    assert_eq!(std::fs::read(&input).unwrap(), before);
    assert_eq!(report.stores.len(), 2);
    assert_eq!(report.stores[0].relative, Path::new("lichess/2013-01.db"));
    assert_eq!(report.stores[0].data_source.as_str(), "lichess");
    assert_eq!(report.stores[1].data_source.as_str(), "twic");
    assert_eq!(report.tagged(), 5);
    assert_eq!(report.pending(), 4);
    assert_eq!(report.classified(), 3);

    let games = read_store(&f.req.out_dir.join("lichess/2013-01.db")).await;
    let openings: Vec<_> = games.iter().map(|g| g.opening.as_deref()).collect();
    assert_eq!(openings, [
      Some("King's Knight Opening"),
      Some("Queen's Pawn Game"),
      None,
      None,
    ]);
    assert!(games[3].parse_error.is_some());

    let untouched = read_store(&input).await;
    assert!(untouched.iter().all(|g| g.opening.is_none()));
    assert!(untouched.iter().all(|g| g.data_source.is_none()));

    assert!(!f.req.out_dir.join("lichess/2013-01.db.partial").exists());
    assert!(f.req.out_dir.join("twic.db").is_file());
  }

  #[tokio::test]
  async fn explicit_label_applies_to_every_store() {
    let mut f = fixture().await;
    f.req.data_source = Some(DataSource::new("archive").unwrap());
    let report = enrich(&f.req, &PipelineConfig::default()).await.unwrap();
    assert!(
      report
        .stores
        .iter()
        .all(|s| s.data_source.as_str() == "archive")
    );

    let games = read_store(&f.req.out_dir.join("twic.db")).await;
    assert_eq!(games[0].data_source.as_ref().unwrap().as_str(), "archive");
  }

  #[tokio::test]
  async fn rerun_gives_identical_labels() {
    let f = fixture().await;
    let config = PipelineConfig {
      jobs: 1,
      ..PipelineConfig::default()
    };
    enrich(&f.req, &config).await.unwrap();
    let first = read_store(&f.req.out_dir.join("lichess/2013-01.db")).await;

    let report = enrich(&f.req, &config).await.unwrap();
    let second = read_store(&f.req.out_dir.join("lichess/2013-01.db")).await;
    assert_eq!(first, second);
    assert_eq!(report.classified(), 3);
  }

  #[tokio::test]
  async fn match_mode_controls_mid_game_matches() {
    let tmp = tempfile::tempdir().unwrap();
    write_catalogue(tmp.path().join("openings.db"), openings())
      .await
      .unwrap();
    write_store(&tmp.path().join("in/x.db"), vec![game(
      "10. Nf3 Nf6 11. d4 d5",
    )])
    .await;
    let req = EnrichRequest {
      in_dir:      tmp.path().join("in"),
      out_dir:     tmp.path().join("out"),
      openings_db: tmp.path().join("openings.db"),
      data_source: None,
    };

    let contains = enrich(&req, &PipelineConfig::default()).await.unwrap();
    assert_eq!(contains.classified(), 1);

    let prefix = PipelineConfig {
      match_mode: MatchMode::Prefix,
      ..PipelineConfig::default()
    };
    assert_eq!(enrich(&req, &prefix).await.unwrap().classified(), 0);
    let games = read_store(&req.out_dir.join("x.db")).await;
    assert_eq!(games[0].opening, None);
  }

  #[tokio::test]
  async fn missing_catalogue_is_reported() {
    let mut f = fixture().await;
    f.req.openings_db = f.req.in_dir.join("nope.db");
    let err = enrich(&f.req, &PipelineConfig::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::MissingCatalogue { .. }), "{err}");
    assert!(!f.req.out_dir.exists());
  }

  #[tokio::test]
  async fn missing_input_is_reported() {
    let mut f = fixture().await;
    f.req.in_dir = f.req.in_dir.join("absent");
    let err = enrich(&f.req, &PipelineConfig::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NoInputFound { .. }), "{err}");
  }

  #[tokio::test]
  async fn unreadable_store_leaves_no_output() {
    let f = fixture().await;
    std::fs::write(f.req.in_dir.join("corrupt.db"), b"not a database").unwrap();

    let err = enrich(&f.req, &PipelineConfig::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::StoreAccess { .. }), "{err}");
    assert!(!f.req.out_dir.join("corrupt.db").exists());
    assert!(!f.req.out_dir.join("corrupt.db.partial").exists());
  }

  #[tokio::test]
  async fn small_batches_classify_every_game() {
    let f = fixture().await;
    let config = PipelineConfig {
      batch_size: 1,
      ..PipelineConfig::default()
    };
    let report = enrich(&f.req, &config).await.unwrap();
    assert_eq!(report.tagged(), 5);
    assert_eq!(report.pending(), 4);
    assert_eq!(report.classified(), 3);
  }

  #[tokio::test]
  async fn failed_run_leaves_no_partial_files() {
    let f = fixture().await;
    for n in 0..6 {
      write_store(&f.req.in_dir.join(format!("more/{n}.db")), vec![game(
        "1. e4 e5",
      )])
      .await;
    }
    std::fs::write(f.req.in_dir.join("corrupt.db"), b"not a database").unwrap();
    let config = PipelineConfig {
      jobs: 2,
      ..PipelineConfig::default()
    };

    let err = enrich(&f.req, &config).await.unwrap_err();
    assert!(matches!(err, Error::StoreAccess { .. }), "{err}");
    let partials: Vec<_> = walkdir::WalkDir::new(&f.req.out_dir)
      .into_iter()
      .filter_map(|e| e.ok())
      .filter(|e| e.path().to_string_lossy().contains(".partial"))
      .collect();
    assert!(partials.is_empty(), "{partials:?}");
  }

  #[test]
  fn partial_file_is_removed_unless_kept() {
    let tmp = tempfile::tempdir().unwrap();
    let dropped = tmp.path().join("a.db.partial");
    let kept = tmp.path().join("b.db.partial");
    std::fs::write(&dropped, b"x").unwrap();
    std::fs::write(with_suffix(&dropped, "-journal"), b"x").unwrap();
    std::fs::write(&kept, b"x").unwrap();

    drop(PartialFile::new(dropped.clone()));
    PartialFile::new(kept.clone()).keep();

    assert!(!dropped.exists());
    assert!(!with_suffix(&dropped, "-journal").exists());
    assert!(kept.is_file());
  }

  #[tokio::test]
  async fn output_over_input_is_rejected() {
    let mut f = fixture().await;
    let input = f.req.in_dir.join("lichess/2013-01.db");
    let before = std::fs::read(&input).unwrap();

    for out_dir in [f.req.in_dir.clone(), f.req.in_dir.join("..")] {
      f.req.out_dir = out_dir;
      let err = enrich(&f.req, &PipelineConfig::default())
        .await
        .unwrap_err();
      assert!(matches!(err, Error::OutputOverlapsInput { .. }), "{err}");
    }
    assert_eq!(std::fs::read(&input).unwrap(), before);
    assert!(!f.req.in_dir.join("lichess/2013-01.db.partial").exists());
  }
}
