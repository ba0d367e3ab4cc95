//! Identifier newtypes and entity references.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<i64> for $name {
      fn from(v: i64) -> Self { Self(v) }
    }
  };
}

id_type!(
  /// A principal (user account).
  UserId
);
id_type!(
  /// A tenant. Id `0` is reserved for the global scope and never names a
  /// company.
  CompanyId
);
id_type!(RoleId);
id_type!(PositionId);

/// The kinds of entity that history and notifications can refer to.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Application,
  JobPost,
  DocumentRequest,
  User,
  Company,
}

/// A typed pointer to a single entity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
  pub kind: EntityKind,
  pub id:   i64,
}

impl EntityRef {
  pub fn new(kind: EntityKind, id: i64) -> Self { Self { kind, id } }

  pub fn application(id: i64) -> Self { Self::new(EntityKind::Application, id) }

  pub fn job_post(id: i64) -> Self { Self::new(EntityKind::JobPost, id) }

  pub fn document_request(id: i64) -> Self {
    Self::new(EntityKind::DocumentRequest, id)
  }

  pub fn user(id: UserId) -> Self { Self::new(EntityKind::User, id.0) }
}

impl fmt::Display for EntityRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.kind, self.id)
  }
}
