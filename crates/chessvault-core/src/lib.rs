//! Core types and trait definitions for the chessvault pipeline.
//!
//! This crate is deliberately free of database and file-format dependencies.
//! It owns the domain model, the canonical move-text encoder, the opening
//! classifier and the partition-key rules; storage backends and the pipeline
//! stages build on top of it.

pub mod classify;
pub mod error;
pub mod game;
pub mod movetext;
pub mod opening;
pub mod partition;
pub mod store;

pub use error::{Error, Result};
