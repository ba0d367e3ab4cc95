//! SQLite backend for the recruitment core.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod provision;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::Capabilities;
pub use provision::{Seed, SeedJobPost, SeedUser};
pub use store::{CounterDrift, SqliteStore};
