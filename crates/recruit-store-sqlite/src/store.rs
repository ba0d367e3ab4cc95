//! [`SqliteStore`]: the SQLite implementation of the core's store traits.

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tracing::{debug, info, warn};

use recruit_core::{
  directory::{
    Company, Credentials, Membership, PermissionCode, Position, Principal,
    Role,
  },
  entity::{
    Application, DocumentRequest, EntityHead, JobPost, NewApplication,
    NewDocumentRequest, StatusSwap, SwapOutcome,
  },
  history::{AuditEvent, NewAuditEvent, NewStatusHistory, StatusHistory},
  ids::{CompanyId, EntityKind, EntityRef, PositionId, RoleId, UserId},
  notification::{NewNotification, Notification},
  overlay::{OverlayEntry, OverlayUpsert, UpsertedOverlay},
  scope::Scope,
  status::{ApplicationStatus, StateMachine as _},
  store::{
    Backend, Directory, HistoryStore, LifecycleStore, NotificationStore,
    OverlayStore,
  },
};

use crate::{
  Error, Result,
  encode::{
    RawApplication, RawAuditEvent, RawDocumentRequest, RawJobPost,
    RawMembership, RawNotification, RawOverlay, RawPermission, RawPosition,
    RawRole, RawStatusHistory, decode_enum, encode_dt,
  },
  schema::{self, Capabilities},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A recruitment store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  caps:            Capabilities,
}

/// A job post whose stored active counter disagreed with a replay of status
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDrift {
  pub job_post_id: i64,
  pub recorded:    i64,
  pub replayed:    i64,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and migrate it to the latest schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::connect(conn, schema::LATEST).await
  }

  /// Open an in-memory store. Useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::connect(conn, schema::LATEST).await
  }

  /// An in-memory store held at an older schema version.
  #[cfg(test)]
  pub(crate) async fn open_in_memory_at(version: u32) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::connect(conn, version).await
  }

  async fn connect(conn: tokio_rusqlite::Connection, target: u32) -> Result<Self> {
    let version = conn
      .call(move |conn| Ok(schema::migrate(conn, target)?))
      .await?;
    let caps = Capabilities::for_version(version);
    info!(schema_version = version, active_counter = caps.active_counter, "store opened");
    Ok(Self { conn, caps })
  }

  pub fn capabilities(&self) -> Capabilities { self.caps }

  fn job_post_columns(&self) -> &'static str {
    if self.caps.active_counter {
      RawJobPost::COLUMNS
    } else {
      RawJobPost::COLUMNS_V1
    }
  }

  /// Rebuild every job post's active counter from status history and
  /// return the posts that had drifted.
  ///
  /// An application's replayed status is the target of its latest history
  /// row, or `submitted` if it has never transitioned. When that disagrees
  /// with the stored status, the swap committed but its history append did
  /// not, and the stored status wins. Reading and rewriting happen in one
  /// transaction.
  pub async fn reconcile_active_counts(&self) -> Result<Vec<CounterDrift>> {
    if !self.caps.active_counter {
      return Err(Error::Unsupported {
        version: self.caps.schema_version,
        feature: "active application counters",
      });
    }

    let (drift, unrecorded): (Vec<CounterDrift>, usize) = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;

        let mut counts: HashMap<i64, i64> = HashMap::new();
        let mut unrecorded = 0;
        {
          let mut stmt = tx.prepare(
            "SELECT a.job_post_id, a.status, (
               SELECT h.new_status FROM status_history h
               WHERE h.entity_kind = 'application'
                 AND h.entity_id = a.application_id
               ORDER BY h.history_id DESC
               LIMIT 1
             )
             FROM applications a",
          )?;
          let rows = stmt.query_map([], |row| {
            Ok((
              row.get::<_, i64>(0)?,
              row.get::<_, String>(1)?,
              row.get::<_, Option<String>>(2)?,
            ))
          })?;
          for row in rows {
            let (job_post_id, stored, latest) = row?;
            let replayed =
              latest.unwrap_or_else(|| ApplicationStatus::Submitted.to_string());
            let status = if replayed == stored {
              replayed
            } else {
              unrecorded += 1;
              stored
            };
            if is_active_status(&status)? {
              *counts.entry(job_post_id).or_default() += 1;
            }
          }
        }

        let posts = tx
          .prepare("SELECT job_post_id, active_applications FROM job_posts")?
          .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut drift = Vec::new();
        for (job_post_id, recorded) in posts {
          let replayed = counts.get(&job_post_id).copied().unwrap_or(0);
          if replayed != recorded {
            tx.execute(
              "UPDATE job_posts SET active_applications = ?1 WHERE job_post_id = ?2",
              rusqlite::params![replayed, job_post_id],
            )?;
            drift.push(CounterDrift { job_post_id, recorded, replayed });
          }
        }
        tx.commit()?;
        Ok((drift, unrecorded))
      })
      .await?;

    if unrecorded > 0 {
      warn!(applications = unrecorded, "status history behind stored status");
    }
    if !drift.is_empty() {
      info!(posts = drift.len(), "active counters reconciled");
    }
    Ok(drift)
  }
}

fn is_active_status(value: &str) -> rusqlite::Result<bool> {
  value
    .parse::<ApplicationStatus>()
    .map(|status| status.is_active())
    .map_err(|e| {
      rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// The conditional-update and current-status queries for a lifecycle table.
///
/// Every `update` binds `?1` next status, `?2` id, `?3` expected status;
/// tables with an `updated_at` column also bind `?4` to the swap time.
struct SwapTable {
  update:  &'static str,
  current: &'static str,
  stamped: bool,
}

fn swap_table(kind: EntityKind) -> Option<SwapTable> {
  match kind {
    EntityKind::Application => Some(SwapTable {
      update:  "UPDATE applications SET status = ?1, updated_at = ?4
                WHERE application_id = ?2 AND status = ?3",
      current: "SELECT status FROM applications WHERE application_id = ?1",
      stamped: true,
    }),
    EntityKind::DocumentRequest => Some(SwapTable {
      update:  "UPDATE document_requests SET status = ?1, updated_at = ?4
                WHERE document_request_id = ?2 AND status = ?3",
      current: "SELECT status FROM document_requests WHERE document_request_id = ?1",
      stamped: true,
    }),
    EntityKind::JobPost => Some(SwapTable {
      update:  "UPDATE job_posts SET status = ?1
                WHERE job_post_id = ?2 AND status = ?3",
      current: "SELECT status FROM job_posts WHERE job_post_id = ?1",
      stamped: false,
    }),
    EntityKind::User | EntityKind::Company => None,
  }
}

impl Backend for SqliteStore {
  type Error = Error;
}

// ─── Directory impl ──────────────────────────────────────────────────────────

impl Directory for SqliteStore {
  async fn principal(&self, user_id: UserId) -> Result<Option<Principal>> {
    let principal = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, username, global_role_id FROM users WHERE user_id = ?1",
              rusqlite::params![user_id.0],
              |row| {
                Ok(Principal {
                  user_id:        UserId(row.get(0)?),
                  username:       row.get(1)?,
                  global_role_id: row.get::<_, Option<i64>>(2)?.map(RoleId),
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(principal)
  }

  async fn credentials(&self, username: String) -> Result<Option<Credentials>> {
    let creds = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, password_hash FROM users
               WHERE username = ?1 AND password_hash IS NOT NULL",
              rusqlite::params![username],
              |row| {
                Ok(Credentials {
                  user_id:       UserId(row.get(0)?),
                  password_hash: row.get(1)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(creds)
  }

  async fn role(&self, role_id: RoleId) -> Result<Option<Role>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM roles WHERE role_id = ?1", RawRole::COLUMNS);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![role_id.0], RawRole::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawRole::into_role).transpose()
  }

  async fn company(&self, company_id: CompanyId) -> Result<Option<Company>> {
    let company = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT company_id, name, owner_id FROM companies WHERE company_id = ?1",
              rusqlite::params![company_id.0],
              |row| {
                Ok(Company {
                  company_id: CompanyId(row.get(0)?),
                  name:       row.get(1)?,
                  owner_id:   UserId(row.get(2)?),
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(company)
  }

  async fn membership(
    &self,
    user_id: UserId,
    company_id: CompanyId,
  ) -> Result<Option<Membership>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM memberships WHERE user_id = ?1 AND company_id = ?2",
          RawMembership::COLUMNS
        );
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params![user_id.0, company_id.0],
              RawMembership::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawMembership::into_membership).transpose()
  }

  async fn position(&self, position_id: PositionId) -> Result<Option<Position>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM positions WHERE position_id = ?1",
          RawPosition::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![position_id.0], RawPosition::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPosition::into_position).transpose()
  }

  async fn permission(&self, code: String) -> Result<Option<PermissionCode>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM permissions WHERE code = ?1",
          RawPermission::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![code], RawPermission::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawPermission::into_permission).transpose()
  }

  async fn permissions(&self) -> Result<Vec<PermissionCode>> {
    let raws = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM permissions ORDER BY code",
          RawPermission::COLUMNS
        );
        let rows = conn
          .prepare(&sql)?
          .query_map([], RawPermission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawPermission::into_permission).collect()
  }

  async fn reviewers(&self, company_id: CompanyId) -> Result<Vec<UserId>> {
    let ids = self
      .conn
      .call(move |conn| {
        let rows = conn
          .prepare(
            "SELECT user_id FROM memberships
             WHERE company_id = ?1
               AND active = 1
               AND approval = 'approved'
               AND position_id IS NOT NULL
             ORDER BY user_id",
          )?
          .query_map(rusqlite::params![company_id.0], |row| {
            Ok(UserId(row.get(0)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(ids)
  }
}

// ─── OverlayStore impl ───────────────────────────────────────────────────────

impl OverlayStore for SqliteStore {
  async fn upsert_overlay(&self, input: OverlayUpsert) -> Result<UpsertedOverlay> {
    let subject    = input.subject_id.0;
    let scope      = input.scope.column();
    let action     = input.action.to_string();
    let expires_at = input.expires_at.map(encode_dt);
    let updated_at = encode_dt(input.updated_at);
    let code       = input.code;
    let note       = input.note;
    let granted_by = input.granted_by.0;

    let (previous, raw) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let previous: Option<String> = tx
          .query_row(
            "SELECT action FROM permission_overlays
             WHERE subject_user_id = ?1 AND scope_company_id = ?2 AND code = ?3",
            rusqlite::params![subject, scope, code],
            |row| row.get(0),
          )
          .optional()?;

        tx.execute(
          "INSERT INTO permission_overlays (
             subject_user_id, scope_company_id, code, action,
             note, granted_by, expires_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (subject_user_id, scope_company_id, code) DO UPDATE SET
             action     = excluded.action,
             note       = excluded.note,
             granted_by = excluded.granted_by,
             expires_at = excluded.expires_at,
             updated_at = excluded.updated_at",
          rusqlite::params![
            subject, scope, code, action, note, granted_by, expires_at,
            updated_at,
          ],
        )?;

        let sql = format!(
          "SELECT {} FROM permission_overlays
           WHERE subject_user_id = ?1 AND scope_company_id = ?2 AND code = ?3",
          RawOverlay::COLUMNS
        );
        let raw = tx.query_row(
          &sql,
          rusqlite::params![subject, scope, code],
          RawOverlay::from_row,
        )?;
        tx.commit()?;
        Ok((previous, raw))
      })
      .await?;

    Ok(UpsertedOverlay {
      entry:    raw.into_entry()?,
      previous: previous
        .map(|p| decode_enum("permission_overlays.action", &p))
        .transpose()?,
    })
  }

  async fn overlays_for(
    &self,
    user_id: UserId,
    scope: Scope,
  ) -> Result<Vec<OverlayEntry>> {
    let scope = scope.column();
    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM permission_overlays
           WHERE subject_user_id = ?1 AND scope_company_id = ?2
           ORDER BY code",
          RawOverlay::COLUMNS
        );
        let rows = conn
          .prepare(&sql)?
          .query_map(rusqlite::params![user_id.0, scope], RawOverlay::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawOverlay::into_entry).collect()
  }
}

// ─── LifecycleStore impl ─────────────────────────────────────────────────────

impl LifecycleStore for SqliteStore {
  async fn entity_head(&self, entity: EntityRef) -> Result<Option<EntityHead>> {
    let sql = match entity.kind {
      EntityKind::Application => {
        "SELECT company_id, applicant_id, job_post_id, reviewer_id, status
         FROM applications WHERE application_id = ?1"
      }
      EntityKind::JobPost => {
        "SELECT company_id, created_by, NULL, NULL, status
         FROM job_posts WHERE job_post_id = ?1"
      }
      EntityKind::DocumentRequest => {
        "SELECT d.company_id, d.applicant_id, NULL, a.reviewer_id, d.status
         FROM document_requests d
         JOIN applications a ON a.application_id = d.application_id
         WHERE d.document_request_id = ?1"
      }
      EntityKind::User | EntityKind::Company => return Ok(None),
    };

    let head = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![entity.id], |row| {
              Ok(EntityHead {
                entity,
                company_id: CompanyId(row.get(0)?),
                owner_id: UserId(row.get(1)?),
                job_post_id: row.get(2)?,
                reviewer_id: row.get::<_, Option<i64>>(3)?.map(UserId),
                status: row.get(4)?,
              })
            })
            .optional()?,
        )
      })
      .await?;
    Ok(head)
  }

  async fn compare_and_swap(&self, swap: StatusSwap) -> Result<SwapOutcome> {
    let Some(table) = swap_table(swap.entity.kind) else {
      return Ok(SwapOutcome::Missing);
    };
    let counter = swap.counter.filter(|_| self.caps.active_counter);
    let at = encode_dt(swap.at);
    let entity = swap.entity;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = if table.stamped {
          tx.execute(
            table.update,
            rusqlite::params![swap.next, entity.id, swap.expected, at],
          )?
        } else {
          tx.execute(table.update, rusqlite::params![swap.next, entity.id, swap.expected])?
        };

        if changed == 0 {
          let current: Option<String> = tx
            .query_row(table.current, rusqlite::params![entity.id], |row| row.get(0))
            .optional()?;
          return Ok(match current {
            Some(current) => SwapOutcome::Conflict { current },
            None => SwapOutcome::Missing,
          });
        }

        if let Some(adj) = counter {
          tx.execute(
            "UPDATE job_posts SET active_applications = active_applications + ?1
             WHERE job_post_id = ?2",
            rusqlite::params![adj.delta, adj.job_post_id],
          )?;
        }
        tx.commit()?;
        Ok(SwapOutcome::Applied)
      })
      .await?;

    debug!(%entity, ?outcome, "compare-and-swap");
    Ok(outcome)
  }

  async fn job_post(&self, job_post_id: i64) -> Result<Option<JobPost>> {
    let sql = format!(
      "SELECT {} FROM job_posts WHERE job_post_id = ?1",
      self.job_post_columns()
    );
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![job_post_id], RawJobPost::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawJobPost::into_job_post).transpose()
  }

  async fn application(&self, application_id: i64) -> Result<Option<Application>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM applications WHERE application_id = ?1",
          RawApplication::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![application_id], RawApplication::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawApplication::into_application).transpose()
  }

  async fn insert_application(
    &self,
    input: NewApplication,
  ) -> Result<Option<Application>> {
    let count_active = input.count_active && self.caps.active_counter;
    let created_at = encode_dt(input.created_at);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO applications (
             company_id, job_post_id, applicant_id, status, cover_note,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, 'submitted', ?4, ?5, ?5)
           ON CONFLICT (job_post_id, applicant_id) DO NOTHING",
          rusqlite::params![
            input.company_id.0,
            input.job_post_id,
            input.applicant_id.0,
            input.cover_note,
            created_at,
          ],
        )?;
        if inserted == 0 {
          return Ok(None);
        }
        let application_id = tx.last_insert_rowid();

        if count_active {
          tx.execute(
            "UPDATE job_posts SET active_applications = active_applications + 1
             WHERE job_post_id = ?1",
            rusqlite::params![input.job_post_id],
          )?;
        }

        let sql = format!(
          "SELECT {} FROM applications WHERE application_id = ?1",
          RawApplication::COLUMNS
        );
        let raw = tx.query_row(
          &sql,
          rusqlite::params![application_id],
          RawApplication::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;
    raw.map(RawApplication::into_application).transpose()
  }

  async fn set_reviewer(
    &self,
    application_id: i64,
    reviewer_id: Option<UserId>,
    at: DateTime<Utc>,
  ) -> Result<Option<Application>> {
    let at = encode_dt(at);
    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE applications SET reviewer_id = ?1, updated_at = ?2
           WHERE application_id = ?3",
          rusqlite::params![reviewer_id.map(|r| r.0), at, application_id],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let sql = format!(
          "SELECT {} FROM applications WHERE application_id = ?1",
          RawApplication::COLUMNS
        );
        Ok(Some(conn.query_row(
          &sql,
          rusqlite::params![application_id],
          RawApplication::from_row,
        )?))
      })
      .await?;
    raw.map(RawApplication::into_application).transpose()
  }

  async fn document_request(
    &self,
    document_request_id: i64,
  ) -> Result<Option<DocumentRequest>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM document_requests WHERE document_request_id = ?1",
          RawDocumentRequest::COLUMNS
        );
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params![document_request_id],
              RawDocumentRequest::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawDocumentRequest::into_document_request).transpose()
  }

  async fn insert_document_request(
    &self,
    input: NewDocumentRequest,
  ) -> Result<DocumentRequest> {
    let created_at = encode_dt(input.created_at);
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO document_requests (
             application_id, company_id, applicant_id, name, status,
             requested_by, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, 'requested', ?5, ?6, ?6)",
          rusqlite::params![
            input.application_id,
            input.company_id.0,
            input.applicant_id.0,
            input.name,
            input.requested_by.0,
            created_at,
          ],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!(
          "SELECT {} FROM document_requests WHERE document_request_id = ?1",
          RawDocumentRequest::COLUMNS
        );
        Ok(conn.query_row(&sql, rusqlite::params![id], RawDocumentRequest::from_row)?)
      })
      .await?;
    raw.into_document_request()
  }
}

// ─── HistoryStore impl ───────────────────────────────────────────────────────

impl HistoryStore for SqliteStore {
  async fn append_status_history(
    &self,
    input: NewStatusHistory,
  ) -> Result<StatusHistory> {
    let kind       = input.entity.kind.to_string();
    let entity_id  = input.entity.id;
    let old_status = input.old_status.clone();
    let new_status = input.new_status.clone();
    let actor_id   = input.actor_id.map(|a| a.0);
    let note       = input.note.clone();
    let created_at = encode_dt(input.created_at);

    let history_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO status_history (
             entity_kind, entity_id, old_status, new_status, actor_id, note,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            kind, entity_id, old_status, new_status, actor_id, note, created_at,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(StatusHistory {
      history_id,
      entity: input.entity,
      old_status: input.old_status,
      new_status: input.new_status,
      actor_id: input.actor_id,
      note: input.note,
      created_at: input.created_at,
    })
  }

  async fn status_history(&self, entity: EntityRef) -> Result<Vec<StatusHistory>> {
    let kind = entity.kind.to_string();
    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM status_history
           WHERE entity_kind = ?1 AND entity_id = ?2
           ORDER BY history_id DESC",
          RawStatusHistory::COLUMNS
        );
        let rows = conn
          .prepare(&sql)?
          .query_map(rusqlite::params![kind, entity.id], RawStatusHistory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawStatusHistory::into_history).collect()
  }

  async fn append_audit(&self, input: NewAuditEvent) -> Result<AuditEvent> {
    let kind      = input.entity.kind.to_string();
    let entity_id = input.entity.id;
    let action    = input.action.clone();
    let actor_id  = input.actor_id.map(|a| a.0);
    let before    = input.before.clone();
    let after     = input.after.clone();
    let metadata  = serde_json::to_string(&input.metadata)?;
    let created_at = encode_dt(input.created_at);

    let audit_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_log (
             entity_kind, entity_id, action, actor_id, before_value,
             after_value, metadata, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            kind, entity_id, action, actor_id, before, after, metadata,
            created_at,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(AuditEvent {
      audit_id,
      entity: input.entity,
      action: input.action,
      actor_id: input.actor_id,
      before: input.before,
      after: input.after,
      metadata: input.metadata,
      created_at: input.created_at,
    })
  }

  async fn audit_trail(&self, entity: EntityRef) -> Result<Vec<AuditEvent>> {
    let kind = entity.kind.to_string();
    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM audit_log
           WHERE entity_kind = ?1 AND entity_id = ?2
           ORDER BY audit_id DESC",
          RawAuditEvent::COLUMNS
        );
        let rows = conn
          .prepare(&sql)?
          .query_map(rusqlite::params![kind, entity.id], RawAuditEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAuditEvent::into_event).collect()
  }
}

// ─── NotificationStore impl ──────────────────────────────────────────────────

impl NotificationStore for SqliteStore {
  async fn insert_notification(&self, input: NewNotification) -> Result<bool> {
    let kind        = input.kind.to_string();
    let entity_kind = input.entity.kind.to_string();
    let payload     = serde_json::to_string(&input.payload)?;
    let created_at  = encode_dt(input.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO notifications (
             recipient_id, kind, entity_kind, entity_id, dedupe_key, payload,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (dedupe_key) DO NOTHING",
          rusqlite::params![
            input.recipient_id.0,
            kind,
            entity_kind,
            input.entity.id,
            input.dedupe_key,
            payload,
            created_at,
          ],
        )?)
      })
      .await?;
    Ok(inserted > 0)
  }

  async fn notifications_for(
    &self,
    recipient_id: UserId,
    unread_only: bool,
  ) -> Result<Vec<Notification>> {
    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM notifications
           WHERE recipient_id = ?1 AND (?2 = 0 OR is_read = 0)
           ORDER BY notification_id DESC",
          RawNotification::COLUMNS
        );
        let rows = conn
          .prepare(&sql)?
          .query_map(
            rusqlite::params![recipient_id.0, unread_only],
            RawNotification::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn mark_notification_read(
    &self,
    recipient_id: UserId,
    notification_id: i64,
  ) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET is_read = 1
           WHERE notification_id = ?1 AND recipient_id = ?2",
          rusqlite::params![notification_id, recipient_id.0],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }
}
