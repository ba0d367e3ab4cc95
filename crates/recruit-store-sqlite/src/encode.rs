//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings. Enums are stored by their snake_case
//! names. Code lists and payloads are compact JSON. Each `Raw*` struct holds
//! one row exactly as read, with a `COLUMNS` list matching `from_row`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use recruit_core::{
  directory::{Membership, PermissionCode, Position, Role},
  entity::{Application, DocumentRequest, JobPost},
  history::{AuditEvent, StatusHistory},
  ids::{CompanyId, EntityKind, EntityRef, PositionId, RoleId, UserId},
  notification::Notification,
  overlay::OverlayEntry,
  scope::Scope,
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

/// Parse a stored enum name.
pub fn decode_enum<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
  value.parse().map_err(|_| Error::Decode {
    column,
    value: value.to_owned(),
  })
}

pub fn encode_codes(codes: &[String]) -> Result<String> {
  Ok(serde_json::to_string(codes)?)
}

pub fn decode_codes(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

fn decode_entity(kind: &str, id: i64) -> Result<EntityRef> {
  Ok(EntityRef::new(decode_enum::<EntityKind>("entity_kind", kind)?, id))
}

// ─── Leaf data ───────────────────────────────────────────────────────────────

pub struct RawRole {
  pub role_id:     i64,
  pub scope:       String,
  pub name:        String,
  pub permissions: String,
}

impl RawRole {
  pub const COLUMNS: &'static str = "role_id, scope, name, permissions";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      role_id:     row.get(0)?,
      scope:       row.get(1)?,
      name:        row.get(2)?,
      permissions: row.get(3)?,
    })
  }

  pub fn into_role(self) -> Result<Role> {
    Ok(Role {
      role_id:     RoleId(self.role_id),
      scope:       decode_enum("roles.scope", &self.scope)?,
      name:        self.name,
      permissions: decode_codes(&self.permissions)?,
    })
  }
}

pub struct RawMembership {
  pub user_id:     i64,
  pub company_id:  i64,
  pub role_id:     Option<i64>,
  pub position_id: Option<i64>,
  pub approval:    String,
  pub active:      bool,
}

impl RawMembership {
  pub const COLUMNS: &'static str =
    "user_id, company_id, role_id, position_id, approval, active";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      company_id:  row.get(1)?,
      role_id:     row.get(2)?,
      position_id: row.get(3)?,
      approval:    row.get(4)?,
      active:      row.get(5)?,
    })
  }

  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      user_id:     UserId(self.user_id),
      company_id:  CompanyId(self.company_id),
      role_id:     self.role_id.map(RoleId),
      position_id: self.position_id.map(PositionId),
      approval:    decode_enum("memberships.approval", &self.approval)?,
      active:      self.active,
    })
  }
}

pub struct RawPosition {
  pub position_id: i64,
  pub company_id:  i64,
  pub name:        String,
  pub permissions: String,
}

impl RawPosition {
  pub const COLUMNS: &'static str = "position_id, company_id, name, permissions";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      position_id: row.get(0)?,
      company_id:  row.get(1)?,
      name:        row.get(2)?,
      permissions: row.get(3)?,
    })
  }

  pub fn into_position(self) -> Result<Position> {
    Ok(Position::new(
      PositionId(self.position_id),
      CompanyId(self.company_id),
      self.name,
      decode_codes(&self.permissions)?,
    ))
  }
}

pub struct RawPermission {
  pub code:       String,
  pub category:   String,
  pub scope:      String,
  pub min_role:   Option<String>,
  pub visibility: String,
}

impl RawPermission {
  pub const COLUMNS: &'static str = "code, category, scope, min_role, visibility";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      code:       row.get(0)?,
      category:   row.get(1)?,
      scope:      row.get(2)?,
      min_role:   row.get(3)?,
      visibility: row.get(4)?,
    })
  }

  pub fn into_permission(self) -> Result<PermissionCode> {
    Ok(PermissionCode {
      code:       self.code,
      category:   self.category,
      scope:      decode_enum("permissions.scope", &self.scope)?,
      min_role:   self.min_role,
      visibility: decode_enum("permissions.visibility", &self.visibility)?,
    })
  }
}

// ─── Overlays ────────────────────────────────────────────────────────────────

pub struct RawOverlay {
  pub subject_user_id:  i64,
  pub scope_company_id: i64,
  pub code:             String,
  pub action:           String,
  pub note:             Option<String>,
  pub granted_by:       i64,
  pub expires_at:       Option<String>,
  pub updated_at:       String,
}

impl RawOverlay {
  pub const COLUMNS: &'static str = "subject_user_id, scope_company_id, code, action, \
                             note, granted_by, expires_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_user_id:  row.get(0)?,
      scope_company_id: row.get(1)?,
      code:             row.get(2)?,
      action:           row.get(3)?,
      note:             row.get(4)?,
      granted_by:       row.get(5)?,
      expires_at:       row.get(6)?,
      updated_at:       row.get(7)?,
    })
  }

  pub fn into_entry(self) -> Result<OverlayEntry> {
    Ok(OverlayEntry {
      subject_id: UserId(self.subject_user_id),
      scope:      Scope::from_column(self.scope_company_id),
      code:       self.code,
      action:     decode_enum("permission_overlays.action", &self.action)?,
      note:       self.note,
      granted_by: UserId(self.granted_by),
      expires_at: decode_opt_dt(self.expires_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Lifecycle entities ──────────────────────────────────────────────────────

pub struct RawJobPost {
  pub job_post_id:         i64,
  pub company_id:          i64,
  pub created_by:          i64,
  pub title:               String,
  pub status:              String,
  pub active_applications: i64,
  pub created_at:          String,
}

impl RawJobPost {
  /// Column list for schemas that maintain the active counter.
  pub const COLUMNS: &'static str = "job_post_id, company_id, created_by, title, \
                             status, active_applications, created_at";
  /// Column list for schemas that predate it.
  pub const COLUMNS_V1: &'static str = "job_post_id, company_id, created_by, title, \
                                status, 0, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      job_post_id:         row.get(0)?,
      company_id:          row.get(1)?,
      created_by:          row.get(2)?,
      title:               row.get(3)?,
      status:              row.get(4)?,
      active_applications: row.get(5)?,
      created_at:          row.get(6)?,
    })
  }

  pub fn into_job_post(self) -> Result<JobPost> {
    Ok(JobPost {
      job_post_id:         self.job_post_id,
      company_id:          CompanyId(self.company_id),
      created_by:          UserId(self.created_by),
      title:               self.title,
      status:              decode_enum("job_posts.status", &self.status)?,
      active_applications: self.active_applications,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawApplication {
  pub application_id: i64,
  pub company_id:     i64,
  pub job_post_id:    i64,
  pub applicant_id:   i64,
  pub status:         String,
  pub reviewer_id:    Option<i64>,
  pub cover_note:     Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawApplication {
  pub const COLUMNS: &'static str = "application_id, company_id, job_post_id, \
                             applicant_id, status, reviewer_id, cover_note, \
                             created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      application_id: row.get(0)?,
      company_id:     row.get(1)?,
      job_post_id:    row.get(2)?,
      applicant_id:   row.get(3)?,
      status:         row.get(4)?,
      reviewer_id:    row.get(5)?,
      cover_note:     row.get(6)?,
      created_at:     row.get(7)?,
      updated_at:     row.get(8)?,
    })
  }

  pub fn into_application(self) -> Result<Application> {
    Ok(Application {
      application_id: self.application_id,
      company_id:     CompanyId(self.company_id),
      job_post_id:    self.job_post_id,
      applicant_id:   UserId(self.applicant_id),
      status:         decode_enum("applications.status", &self.status)?,
      reviewer_id:    self.reviewer_id.map(UserId),
      cover_note:     self.cover_note,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawDocumentRequest {
  pub document_request_id: i64,
  pub application_id:      i64,
  pub company_id:          i64,
  pub applicant_id:        i64,
  pub name:                String,
  pub status:              String,
  pub requested_by:        i64,
  pub created_at:          String,
  pub updated_at:          String,
}

impl RawDocumentRequest {
  pub const COLUMNS: &'static str = "document_request_id, application_id, company_id, \
                             applicant_id, name, status, requested_by, \
                             created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_request_id: row.get(0)?,
      application_id:      row.get(1)?,
      company_id:          row.get(2)?,
      applicant_id:        row.get(3)?,
      name:                row.get(4)?,
      status:              row.get(5)?,
      requested_by:        row.get(6)?,
      created_at:          row.get(7)?,
      updated_at:          row.get(8)?,
    })
  }

  pub fn into_document_request(self) -> Result<DocumentRequest> {
    Ok(DocumentRequest {
      document_request_id: self.document_request_id,
      application_id:      self.application_id,
      company_id:          CompanyId(self.company_id),
      applicant_id:        UserId(self.applicant_id),
      name:                self.name,
      status:              decode_enum("document_requests.status", &self.status)?,
      requested_by:        UserId(self.requested_by),
      created_at:          decode_dt(&self.created_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Ledgers ─────────────────────────────────────────────────────────────────

pub struct RawStatusHistory {
  pub history_id:  i64,
  pub entity_kind: String,
  pub entity_id:   i64,
  pub old_status:  String,
  pub new_status:  String,
  pub actor_id:    Option<i64>,
  pub note:        Option<String>,
  pub created_at:  String,
}

impl RawStatusHistory {
  pub const COLUMNS: &'static str = "history_id, entity_kind, entity_id, old_status, \
                             new_status, actor_id, note, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      history_id:  row.get(0)?,
      entity_kind: row.get(1)?,
      entity_id:   row.get(2)?,
      old_status:  row.get(3)?,
      new_status:  row.get(4)?,
      actor_id:    row.get(5)?,
      note:        row.get(6)?,
      created_at:  row.get(7)?,
    })
  }

  pub fn into_history(self) -> Result<StatusHistory> {
    Ok(StatusHistory {
      history_id: self.history_id,
      entity:     decode_entity(&self.entity_kind, self.entity_id)?,
      old_status: self.old_status,
      new_status: self.new_status,
      actor_id:   self.actor_id.map(UserId),
      note:       self.note,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAuditEvent {
  pub audit_id:     i64,
  pub entity_kind:  String,
  pub entity_id:    i64,
  pub action:       String,
  pub actor_id:     Option<i64>,
  pub before_value: Option<String>,
  pub after_value:  Option<String>,
  pub metadata:     String,
  pub created_at:   String,
}

impl RawAuditEvent {
  pub const COLUMNS: &'static str = "audit_id, entity_kind, entity_id, action, \
                             actor_id, before_value, after_value, metadata, \
                             created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      audit_id:     row.get(0)?,
      entity_kind:  row.get(1)?,
      entity_id:    row.get(2)?,
      action:       row.get(3)?,
      actor_id:     row.get(4)?,
      before_value: row.get(5)?,
      after_value:  row.get(6)?,
      metadata:     row.get(7)?,
      created_at:   row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<AuditEvent> {
    Ok(AuditEvent {
      audit_id:   self.audit_id,
      entity:     decode_entity(&self.entity_kind, self.entity_id)?,
      action:     self.action,
      actor_id:   self.actor_id.map(UserId),
      before:     self.before_value,
      after:      self.after_value,
      metadata:   serde_json::from_str(&self.metadata)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub struct RawNotification {
  pub notification_id: i64,
  pub recipient_id:    i64,
  pub kind:            String,
  pub entity_kind:     String,
  pub entity_id:       i64,
  pub dedupe_key:      String,
  pub payload:         String,
  pub is_read:         bool,
  pub created_at:      String,
}

impl RawNotification {
  pub const COLUMNS: &'static str = "notification_id, recipient_id, kind, entity_kind, \
                             entity_id, dedupe_key, payload, is_read, \
                             created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      recipient_id:    row.get(1)?,
      kind:            row.get(2)?,
      entity_kind:     row.get(3)?,
      entity_id:       row.get(4)?,
      dedupe_key:      row.get(5)?,
      payload:         row.get(6)?,
      is_read:         row.get(7)?,
      created_at:      row.get(8)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: self.notification_id,
      recipient_id:    UserId(self.recipient_id),
      kind:            decode_enum("notifications.kind", &self.kind)?,
      entity:          decode_entity(&self.entity_kind, self.entity_id)?,
      dedupe_key:      self.dedupe_key,
      payload:         serde_json::from_str(&self.payload)?,
      is_read:         self.is_read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
