//! Append-only history: status transitions and audit events.
//!
//! A status-history row is written once per committed transition. Audit
//! events cover everything else that mutates state (overlay upserts,
//! submissions, reviewer assignment, document requests). Neither ledger is
//! ever updated or deleted, and both read newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  Error, Result,
  clock::Clock,
  directory::codes,
  gate::Gate,
  ids::{EntityKind, EntityRef, UserId},
  scope::Scope,
  store::RecruitStore,
};

/// Audit action names.
pub mod actions {
  pub const OVERLAY_UPSERTED: &str = "overlay.upserted";
  pub const APPLICATION_SUBMITTED: &str = "application.submitted";
  pub const REVIEWER_ASSIGNED: &str = "application.reviewer_assigned";
  pub const DOCUMENT_REQUESTED: &str = "document.requested";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistory {
  pub history_id: i64,
  pub entity:     EntityRef,
  pub old_status: String,
  pub new_status: String,
  pub actor_id:   Option<UserId>,
  pub note:       Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStatusHistory {
  pub entity:     EntityRef,
  pub old_status: String,
  pub new_status: String,
  pub actor_id:   Option<UserId>,
  pub note:       Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
  pub audit_id:   i64,
  pub entity:     EntityRef,
  pub action:     String,
  pub actor_id:   Option<UserId>,
  pub before:     Option<String>,
  pub after:      Option<String>,
  pub metadata:   serde_json::Value,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEvent {
  pub entity:     EntityRef,
  pub action:     String,
  pub actor_id:   Option<UserId>,
  pub before:     Option<String>,
  pub after:      Option<String>,
  pub metadata:   serde_json::Value,
  pub created_at: DateTime<Utc>,
}

pub struct HistoryRecorder<'a, S> {
  store: &'a S,
  clock: &'a dyn Clock,
}

impl<'a, S: RecruitStore> HistoryRecorder<'a, S> {
  pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self { Self { store, clock } }

  pub async fn record_transition(
    &self,
    entity: EntityRef,
    old_status: &str,
    new_status: &str,
    actor_id: Option<UserId>,
    note: Option<String>,
  ) -> Result<StatusHistory> {
    let row = self
      .store
      .append_status_history(NewStatusHistory {
        entity,
        old_status: old_status.to_owned(),
        new_status: new_status.to_owned(),
        actor_id,
        note,
        created_at: self.clock.now(),
      })
      .await
      .map_err(Error::store)?;
    debug!(%entity, history_id = row.history_id, "status history appended");
    Ok(row)
  }

  pub async fn record_audit(
    &self,
    entity: EntityRef,
    action: &str,
    actor_id: Option<UserId>,
    before: Option<String>,
    after: Option<String>,
    metadata: serde_json::Value,
  ) -> Result<AuditEvent> {
    self
      .store
      .append_audit(NewAuditEvent {
        entity,
        action: action.to_owned(),
        actor_id,
        before,
        after,
        metadata,
        created_at: self.clock.now(),
      })
      .await
      .map_err(Error::store)
  }

  /// Every committed transition of `entity`, newest first.
  pub async fn list_for(&self, entity: EntityRef) -> Result<Vec<StatusHistory>> {
    self.store.status_history(entity).await.map_err(Error::store)
  }

  pub async fn audit_for(&self, entity: EntityRef) -> Result<Vec<AuditEvent>> {
    self.store.audit_trail(entity).await.map_err(Error::store)
  }

  /// The transition timeline of a lifecycle entity as `viewer` may see it.
  ///
  /// The entity's owner always sees the timeline; anyone else needs
  /// `application.view_internal` at the entity's company. Notes are only
  /// shown to holders of that code.
  pub async fn timeline(
    &self,
    gate: &Gate<'_, S>,
    viewer: Option<UserId>,
    entity: EntityRef,
  ) -> Result<Vec<StatusHistory>> {
    if !matches!(
      entity.kind,
      EntityKind::Application | EntityKind::JobPost | EntityKind::DocumentRequest
    ) {
      return Err(Error::Validation(format!("{} has no timeline", entity.kind)));
    }
    let head = self
      .store
      .entity_head(entity)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound(entity))?;
    let scope = Scope::Company(head.company_id);

    let staff = gate
      .allows(viewer, codes::APPLICATION_VIEW_INTERNAL, scope)
      .await;
    if !staff && viewer != Some(head.owner_id) {
      return Err(Error::denied(
        codes::APPLICATION_VIEW_INTERNAL,
        scope,
        viewer,
      ));
    }

    let mut rows = self.list_for(entity).await?;
    if !staff {
      for row in &mut rows {
        row.note = None;
      }
    }
    Ok(rows)
  }
}
