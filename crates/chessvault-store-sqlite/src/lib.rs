//! SQLite backend for chessvault.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! connection thread without blocking the async runtime. Per-source game
//! stores, the opening catalogue and the consolidation working table are all
//! plain SQLite files.

mod catalogue;
mod combined;
mod encode;
mod schema;
mod store;

pub mod error;

pub use catalogue::{load_catalogue, write_catalogue};
pub use combined::{CombinedTable, PartitionCount, RowPage};
pub use error::{Error, Result};
pub use store::SqliteGameStore;
