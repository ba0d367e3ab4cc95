//! Error types for `recruit-core`.

use thiserror::Error;

use crate::{
  ids::{EntityKind, EntityRef, UserId},
  scope::Scope,
};

#[derive(Debug, Error)]
pub enum Error {
  /// The actor does not hold `code` at `scope`. Carries nothing about the
  /// state of other subjects.
  #[error("permission {code:?} denied at {scope}")]
  AuthorizationDenied {
    code:    String,
    scope:   Scope,
    user_id: Option<UserId>,
  },

  #[error("invalid {entity} transition: {from} -> {to}")]
  InvalidTransition {
    entity: EntityKind,
    from:   String,
    to:     String,
  },

  /// A compare-and-swap lost to a concurrent writer.
  #[error("{entity} changed concurrently: expected {expected}, found {actual}")]
  ConcurrentModification {
    entity:   EntityRef,
    expected: String,
    actual:   String,
  },

  #[error("{0} not found")]
  NotFound(EntityRef),

  #[error("validation error: {0}")]
  Validation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub fn denied(
    code: impl Into<String>,
    scope: Scope,
    user_id: Option<UserId>,
  ) -> Self {
    Self::AuthorizationDenied { code: code.into(), scope, user_id }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
