//! The chessvault pipeline stages.
//!
//! [`enrich::enrich`] tags each per-source store with its provenance and
//! labels its games with openings from the catalogue.
//! [`consolidate::consolidate`] merges the enriched stores into one combined
//! table and exports it as Hive-partitioned Parquet. Both take a
//! [`PipelineConfig`] loaded once by the caller.

pub mod config;
pub mod consolidate;
pub mod discover;
pub mod enrich;
pub mod error;

pub use config::PipelineConfig;
pub use consolidate::{ConsolidateReport, ConsolidateRequest, consolidate};
pub use enrich::{EnrichReport, EnrichRequest, enrich};
pub use error::{Error, Result};
