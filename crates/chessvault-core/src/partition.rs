//! Partition keys for the consolidated export.
//!
//! The export is laid out Hive-style, one directory level per key:
//! `dataSource=<label>/year=<YYYY>/month=<MM>/`. Readers prune on the
//! directory names, so the key values never appear inside the data files.

use std::{fmt::Write as _, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Directory value used when a partition column is null.
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// The `(dataSource, year, month)` triple a consolidated game is filed under.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PartitionKey {
  pub data_source: Option<String>,
  pub year:        i32,
  month:           u32,
}

impl PartitionKey {
  /// An empty data source, or one spelled like the null marker, is the null
  /// partition: both would render to its directory.
  pub fn new(data_source: Option<String>, year: i32, month: u32) -> Result<Self> {
    if !(1..=12).contains(&month) {
      return Err(Error::InvalidMonth(month));
    }
    let data_source =
      data_source.filter(|s| !s.is_empty() && s != NULL_PARTITION);
    Ok(Self {
      data_source,
      year,
      month,
    })
  }

  pub fn month(&self) -> u32 { self.month }

  /// Zero-padded two-digit month, as it appears in paths.
  pub fn month_label(&self) -> String { format!("{:02}", self.month) }

  /// The partition's directory relative to the export root.
  pub fn relative_dir(&self) -> PathBuf {
    let data_source = self
      .data_source
      .as_deref()
      .map_or_else(|| NULL_PARTITION.to_owned(), escape_value);

    PathBuf::from(format!("dataSource={data_source}"))
      .join(format!("year={}", self.year))
      .join(format!("month={}", self.month_label()))
  }
}

/// Percent-encode characters that cannot appear verbatim in a Hive partition
/// directory name.
fn escape_value(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  for c in value.chars() {
    let reserved = matches!(
      c,
      '/' | '\\' | '=' | '%' | ':' | '#' | '?' | '*' | '"' | '\'' | '<' | '>' | '|'
    );
    if reserved || c.is_control() {
      let mut buf = [0u8; 4];
      for b in c.encode_utf8(&mut buf).bytes() {
        let _ = write!(out, "%{b:02X}");
      }
    } else {
      out.push(c);
    }
  }
  out
}
