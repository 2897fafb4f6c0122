//! Pipeline settings, read once at start-up and handed to each stage.

use std::path::Path;

use chessvault_core::{classify::MatchMode, game::MIN_EXPORT_YEAR};
use chessvault_parquet::ExportOptions;
use serde::Deserialize;

/// Prefix of the environment variables that override file settings, e.g.
/// `CHESSVAULT_MIN_YEAR=1600`.
pub const ENV_PREFIX: &str = "CHESSVAULT";

/// Settings file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "chessvault.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Games dated before this year are left out of the export.
  pub min_year:        i32,
  pub match_mode:      MatchMode,
  /// How many stores are enriched at once.
  pub jobs:            usize,
  /// File extension that marks a per-source store during discovery.
  pub store_extension: String,
  pub row_group_size:  usize,
  /// Rows held in memory at once while classifying or exporting.
  pub batch_size:      usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      min_year:        MIN_EXPORT_YEAR,
      match_mode:      MatchMode::default(),
      jobs:            4,
      store_extension: "db".into(),
      row_group_size:  ExportOptions::default().row_group_size,
      batch_size:      10_000,
    }
  }
}

impl PipelineConfig {
  /// Layer the optional TOML file at `path` under `CHESSVAULT_*` environment
  /// variables. Missing keys keep their defaults.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
    Self::from_sources(path.as_ref(), environment())
  }

  fn from_sources(
    path: &Path,
    env: config::Environment,
  ) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(env)
      .build()?
      .try_deserialize()
  }

  /// Enrichment concurrency, never below one.
  pub fn jobs(&self) -> usize { self.jobs.max(1) }

  pub fn batch_size(&self) -> usize { self.batch_size.max(1) }

  pub fn export_options(&self) -> ExportOptions {
    ExportOptions {
      row_group_size: self.row_group_size.max(1),
    }
  }
}

fn environment() -> config::Environment {
  config::Environment::with_prefix(ENV_PREFIX).try_parsing(true)
}
