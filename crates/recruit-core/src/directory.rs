//! Leaf data: principals, roles, companies, memberships, positions and the
//! permission catalog.
//!
//! These records are owned by other parts of the platform. The core only
//! reads them, through [`crate::store::Directory`].

use serde::{Deserialize, Serialize};

use crate::ids::{CompanyId, PositionId, RoleId, UserId};

/// Name of the role that carries administrator semantics in either scope.
pub const ADMIN_ROLE: &str = "admin";

/// Well-known permission codes referenced by the core itself.
pub mod codes {
  /// Upsert grant/revoke overlays for other users.
  pub const PERMISSIONS_MANAGE: &str = "permissions.manage";
  /// Apply to a published job post.
  pub const APPLICATION_SUBMIT: &str = "application.submit";
  /// Move an application between statuses.
  pub const APPLICATION_STATUS_UPDATE: &str = "application.status.update";
  /// Assign a reviewer to an application.
  pub const APPLICATION_ASSIGN: &str = "application.assign";
  /// See internal notes on application timelines.
  pub const APPLICATION_VIEW_INTERNAL: &str = "application.view_internal";
  /// Publish, pause and close job posts.
  pub const JOB_POST_MANAGE: &str = "job_post.manage";
  /// Request, approve and reject applicant documents.
  pub const DOCUMENT_REVIEW: &str = "document.review";
}

// ─── Principals & roles ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub user_id:        UserId,
  pub username:       String,
  pub global_role_id: Option<RoleId>,
}

/// Stored login material for a principal.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub user_id:       UserId,
  /// argon2 PHC string.
  pub password_hash: String,
}

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoleScope {
  Global,
  Company,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub role_id:     RoleId,
  pub scope:       RoleScope,
  pub name:        String,
  pub permissions: Vec<String>,
}

impl Role {
  pub fn is_admin(&self) -> bool { self.name == ADMIN_ROLE }
}

// ─── Companies & memberships ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
  pub company_id: CompanyId,
  pub name:       String,
  /// The creator of the company.
  pub owner_id:   UserId,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

/// A user's seat in a company. At most one per (user, company).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
  pub user_id:     UserId,
  pub company_id:  CompanyId,
  pub role_id:     Option<RoleId>,
  pub position_id: Option<PositionId>,
  pub approval:    ApprovalStatus,
  pub active:      bool,
}

impl Membership {
  /// Whether the member's position defaults apply.
  pub fn is_in_good_standing(&self) -> bool {
    self.active && self.approval == ApprovalStatus::Approved
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
  pub position_id: PositionId,
  pub company_id:  CompanyId,
  pub name:        String,
  /// Default codes; ordered and free of duplicates.
  pub permissions: Vec<String>,
}

impl Position {
  pub fn new(
    position_id: PositionId,
    company_id: CompanyId,
    name: impl Into<String>,
    permissions: impl IntoIterator<Item = impl Into<String>>,
  ) -> Self {
    Self {
      position_id,
      company_id,
      name: name.into(),
      permissions: dedup_ordered(permissions),
    }
  }
}

/// Drop repeated codes while keeping first-seen order.
pub fn dedup_ordered(
  codes: impl IntoIterator<Item = impl Into<String>>,
) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for code in codes {
    let code = code.into();
    if !out.contains(&code) {
      out.push(code);
    }
  }
  out
}

// ─── Permission catalog ──────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
  /// Held by everyone, anonymous callers included.
  Public,
  /// Listed in admin tooling; must be conferred.
  #[default]
  Listed,
  /// Conferred like `Listed` but not shown in admin tooling.
  Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCode {
  pub code:       String,
  pub category:   String,
  /// Whether the code is meaningful globally or per company.
  pub scope:      RoleScope,
  /// Advisory: the least role expected to carry this code.
  pub min_role:   Option<String>,
  pub visibility: Visibility,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn position_codes_are_deduplicated_in_order() {
    let p = Position::new(
      PositionId(1),
      CompanyId(1),
      "recruiter",
      ["b", "a", "b", "c", "a"],
    );
    assert_eq!(p.permissions, vec!["b", "a", "c"]);
  }

  #[test]
  fn membership_standing_requires_active_and_approved() {
    let mut m = Membership {
      user_id:     UserId(1),
      company_id:  CompanyId(1),
      role_id:     None,
      position_id: Some(PositionId(1)),
      approval:    ApprovalStatus::Approved,
      active:      true,
    };
    assert!(m.is_in_good_standing());
    m.active = false;
    assert!(!m.is_in_good_standing());
    m.active = true;
    m.approval = ApprovalStatus::Pending;
    assert!(!m.is_in_good_standing());
  }
}
