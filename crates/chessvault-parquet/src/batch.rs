//! Arrow schema and record-batch conversion for consolidated games.
//!
//! Partition columns (`dataSource`, `year`, `month`) are not part of the file
//! schema; they live in the directory path.

use std::sync::{Arc, LazyLock};

use arrow_array::{ArrayRef, Date32Array, Int32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use chessvault_core::game::ConsolidatedGame;
use chrono::Datelike;

use crate::Result;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
  Arc::new(Schema::new(vec![
    Field::new("Event", DataType::Utf8, true),
    Field::new("Site", DataType::Utf8, true),
    Field::new("White", DataType::Utf8, true),
    Field::new("Black", DataType::Utf8, true),
    Field::new("Result", DataType::Utf8, true),
    Field::new("WhiteTitle", DataType::Utf8, true),
    Field::new("BlackTitle", DataType::Utf8, true),
    Field::new("WhiteElo", DataType::Int32, true),
    Field::new("BlackElo", DataType::Int32, true),
    Field::new("UTCDate", DataType::Date32, false),
    Field::new("UTCTime", DataType::Utf8, true),
    Field::new("TimeControl", DataType::Utf8, true),
    Field::new("Source", DataType::Utf8, true),
    Field::new("eco", DataType::Utf8, true),
    Field::new("opening", DataType::Utf8, true),
    Field::new("cleanMovetext", DataType::Utf8, true),
  ]))
});

/// The schema every exported file is written with.
pub fn schema() -> SchemaRef { SCHEMA.clone() }

fn strings<'a>(
  rows: &'a [ConsolidatedGame],
  field: impl Fn(&'a ConsolidatedGame) -> &'a Option<String>,
) -> ArrayRef {
  Arc::new(StringArray::from_iter(rows.iter().map(|r| field(r).as_deref())))
}

fn ints(
  rows: &[ConsolidatedGame],
  field: impl Fn(&ConsolidatedGame) -> Option<i32>,
) -> ArrayRef {
  Arc::new(Int32Array::from_iter(rows.iter().map(field)))
}

/// Convert one partition's rows into a single record batch.
pub fn to_record_batch(rows: &[ConsolidatedGame]) -> Result<RecordBatch> {
  let dates = Date32Array::from_iter_values(
    rows
      .iter()
      .map(|r| r.utc_date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
  );

  let columns: Vec<ArrayRef> = vec![
    strings(rows, |r| &r.event),
    strings(rows, |r| &r.site),
    strings(rows, |r| &r.white),
    strings(rows, |r| &r.black),
    strings(rows, |r| &r.result),
    strings(rows, |r| &r.white_title),
    strings(rows, |r| &r.black_title),
    ints(rows, |r| r.white_elo),
    ints(rows, |r| r.black_elo),
    Arc::new(dates),
    strings(rows, |r| &r.utc_time),
    strings(rows, |r| &r.time_control),
    strings(rows, |r| &r.source),
    strings(rows, |r| &r.eco),
    strings(rows, |r| &r.opening),
    strings(rows, |r| &r.clean_movetext),
  ];

  Ok(RecordBatch::try_new(schema(), columns)?)
}

#[cfg(test)]
pub(crate) mod tests {
  use arrow_array::Array;
  use chrono::NaiveDate;

  use super::*;

  pub(crate) fn row(date: NaiveDate, opening: Option<&str>) -> ConsolidatedGame {
    ConsolidatedGame {
      event:          Some("Rated Blitz game".into()),
      site:           None,
      white:          Some("alice".into()),
      black:          Some("bob".into()),
      result:         Some("0-1".into()),
      white_title:    None,
      black_title:    Some("GM".into()),
      white_elo:      Some(2100),
      black_elo:      None,
      utc_date:       date,
      utc_time:       Some("23:59:59".into()),
      time_control:   Some("180+0".into()),
      source:         None,
      eco:            opening.map(|_| "C20".into()),
      opening:        opening.map(str::to_owned),
      clean_movetext: Some("1. e4 e5".into()),
      data_source:    Some("lichess".into()),
      year:           date.year(),
      month:          format!("{:02}", date.month()),
    }
  }

  #[test]
  fn dates_are_days_since_unix_epoch() {
    let rows = [
      row(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(), None),
      row(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap(), None),
      row(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap(), None),
    ];
    let batch = to_record_batch(&rows).unwrap();
    let dates = batch
      .column(9)
      .as_any()
      .downcast_ref::<Date32Array>()
      .unwrap();
    assert_eq!(dates.values().to_vec(), vec![0, 1, -1]);
  }

  #[test]
  fn nulls_are_preserved() {
    let rows = [row(NaiveDate::from_ymd_opt(2013, 1, 1).unwrap(), None)];
    let batch = to_record_batch(&rows).unwrap();
    assert_eq!(batch.num_rows(), 1);
    assert!(batch.column(1).is_null(0), "Site");
    assert!(batch.column(8).is_null(0), "BlackElo");
    assert!(batch.column(14).is_null(0), "opening");
    assert!(!batch.column(7).is_null(0), "WhiteElo");
  }

  #[test]
  fn partition_columns_are_not_in_the_file_schema() {
    let schema = schema();
    for name in ["dataSource", "year", "month"] {
      assert!(schema.field_with_name(name).is_err(), "{name}");
    }
    assert!(schema.field_with_name("cleanMovetext").is_ok());
  }

  #[test]
  fn empty_partition_gives_empty_batch() {
    let batch = to_record_batch(&[]).unwrap();
    assert_eq!(batch.num_rows(), 0);
    assert_eq!(batch.num_columns(), schema().fields().len());
  }
}
