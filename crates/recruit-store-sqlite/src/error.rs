//! Error type for `recruit-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column held a value no domain type accepts.
  #[error("cannot decode {column}: {value:?}")]
  Decode { column: &'static str, value: String },

  /// The open schema predates a feature the caller asked for.
  #[error("schema version {version} does not support {feature}")]
  Unsupported { version: u32, feature: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
