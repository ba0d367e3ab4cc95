//! Permission scopes.
//!
//! A scope is either global or a single company. The persisted form is a
//! plain integer column where `0` means global.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::CompanyId;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
  Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "company_id", rename_all = "snake_case")]
pub enum Scope {
  #[default]
  Global,
  Company(CompanyId),
}

impl Scope {
  /// The `scope_company_id` column value.
  pub fn column(self) -> i64 {
    match self {
      Self::Global => 0,
      Self::Company(id) => id.0,
    }
  }

  /// Inverse of [`Scope::column`]. Non-positive ids collapse to global.
  pub fn from_column(v: i64) -> Self {
    if v <= 0 { Self::Global } else { Self::Company(CompanyId(v)) }
  }

  pub fn company(self) -> Option<CompanyId> {
    match self {
      Self::Global => None,
      Self::Company(id) => Some(id),
    }
  }

  pub fn is_global(self) -> bool { matches!(self, Self::Global) }
}

impl From<Option<CompanyId>> for Scope {
  fn from(company: Option<CompanyId>) -> Self {
    company.map_or(Self::Global, |id| Self::from_column(id.0))
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Global => f.write_str("global"),
      Self::Company(id) => write!(f, "company:{id}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_column_is_global() {
    assert_eq!(Scope::from_column(0), Scope::Global);
    assert_eq!(Scope::Global.column(), 0);
  }

  #[test]
  fn company_column_roundtrips() {
    let scope = Scope::Company(CompanyId(42));
    assert_eq!(Scope::from_column(scope.column()), scope);
    assert_eq!(scope.to_string(), "company:42");
  }

  #[test]
  fn company_zero_is_not_a_company() {
    assert_eq!(Scope::from(Some(CompanyId(0))), Scope::Global);
    assert_eq!(Scope::from(None), Scope::Global);
  }
}
