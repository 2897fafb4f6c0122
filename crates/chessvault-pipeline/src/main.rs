//! chessvault command-line entry point.
//!
//! Summaries go to stdout; logs go to stderr and follow `RUST_LOG`.

use std::path::PathBuf;

use anyhow::Context as _;
use chessvault_core::game::DataSource;
use chessvault_pipeline::{
  ConsolidateRequest, EnrichRequest, PipelineConfig, config::DEFAULT_CONFIG_FILE,
};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Chess game enrichment and consolidation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Tag each store with its data source and classify openings.
  Enrich {
    /// Directory holding the per-source stores.
    #[arg(long, visible_alias = "inDir")]
    in_dir:      PathBuf,
    /// Directory the enriched stores are written to.
    #[arg(long, visible_alias = "outDir")]
    out_dir:     PathBuf,
    /// SQLite database with the `openings` table.
    #[arg(long, visible_alias = "openingsDb")]
    openings_db: PathBuf,
    /// Label for every store; defaults to each store's directory name.
    #[arg(long, visible_alias = "dataSource", value_parser = parse_data_source)]
    data_source: Option<DataSource>,
  },

  /// Merge enriched stores and export them as partitioned Parquet.
  Consolidate {
    /// Directory holding the enriched stores.
    #[arg(long, visible_alias = "inDir")]
    in_dir:      PathBuf,
    /// Export directory. Its previous contents are replaced.
    #[arg(long, visible_alias = "outDir")]
    out_dir:     PathBuf,
    /// SQLite file for the combined working table. Recreated on every run.
    #[arg(long, visible_alias = "outDb")]
    out_db:      PathBuf,
    /// Label every row with this data source instead of its store's own.
    #[arg(long, visible_alias = "dataSource", value_parser = parse_data_source)]
    data_source: Option<DataSource>,
  },
}

fn parse_data_source(s: &str) -> Result<DataSource, chessvault_core::Error> {
  DataSource::new(s)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let config = PipelineConfig::load(&cli.config).with_context(|| {
    format!("failed to load configuration from {}", cli.config.display())
  })?;
  tracing::debug!(?config, "configuration loaded");

  match cli.command {
    Command::Enrich {
      in_dir,
      out_dir,
      openings_db,
      data_source,
    } => {
      let req = EnrichRequest {
        in_dir,
        out_dir,
        openings_db,
        data_source,
      };
      let report = chessvault_pipeline::enrich(&req, &config)
        .await
        .context("enrichment failed")?;

      for store in &report.stores {
        println!(
          "{}\t{}\ttagged={}\tpending={}\tclassified={}",
          store.relative.display(),
          store.data_source,
          store.summary.tagged,
          store.pending,
          store.summary.classified,
        );
      }
      println!(
        "enriched {} stores: tagged={} pending={} classified={}",
        report.stores.len(),
        report.tagged(),
        report.pending(),
        report.classified(),
      );
    }

    Command::Consolidate {
      in_dir,
      out_dir,
      out_db,
      data_source,
    } => {
      let req = ConsolidateRequest {
        in_dir,
        out_dir,
        out_db,
        data_source,
      };
      let report = chessvault_pipeline::consolidate(&req, &config)
        .await
        .context("consolidation failed")?;

      for partition in &report.partitions {
        println!(
          "{}\t{}",
          partition.key.relative_dir().display(),
          partition.rows
        );
      }
      println!(
        "consolidated {} stores into {} partitions: {} rows in {}",
        report.stores.len(),
        report.partitions.len(),
        report.total_rows,
        report.out_dir.display(),
      );
    }
  }

  Ok(())
}
