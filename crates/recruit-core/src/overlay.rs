//! Per-subject grant/revoke overlays and the service that writes them.
//!
//! An overlay row is keyed by (subject, scope, code). Writing the same key
//! again replaces the row in place, so applying an action twice changes only
//! the note and timestamps, and applying the opposite action flips it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
  Error, Result,
  clock::Clock,
  gate::Gate,
  history::{HistoryRecorder, actions},
  ids::{EntityKind, EntityRef, UserId},
  scope::Scope,
  store::RecruitStore,
};

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
pub enum OverlayAction {
  Grant,
  Revoke,
}

/// A stored overlay row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayEntry {
  pub subject_id: UserId,
  pub scope:      Scope,
  pub code:       String,
  pub action:     OverlayAction,
  pub note:       Option<String>,
  pub granted_by: UserId,
  pub expires_at: Option<DateTime<Utc>>,
  pub updated_at: DateTime<Utc>,
}

impl OverlayEntry {
  /// An entry takes part in resolution until its expiry passes.
  pub fn is_live(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_none_or(|at| at > now)
  }
}

/// What a caller asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayRequest {
  pub subject_id: UserId,
  #[serde(default)]
  pub scope:      Scope,
  pub code:       String,
  pub action:     OverlayAction,
  pub note:       Option<String>,
  pub expires_at: Option<DateTime<Utc>>,
}

/// What the service hands to [`crate::store::OverlayStore::upsert_overlay`].
#[derive(Debug, Clone)]
pub struct OverlayUpsert {
  pub subject_id: UserId,
  pub scope:      Scope,
  pub code:       String,
  pub action:     OverlayAction,
  pub note:       Option<String>,
  pub granted_by: UserId,
  pub expires_at: Option<DateTime<Utc>>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertedOverlay {
  pub entry:    OverlayEntry,
  /// The action the row held before this write; `None` for a fresh row.
  pub previous: Option<OverlayAction>,
}

/// Layer live overlay entries on top of a baseline.
///
/// Grants from any layer are added first; revokes from any layer are then
/// removed, so a revoke beats every grant and every baseline code.
pub fn apply_overlays<'e>(
  mut baseline: BTreeSet<String>,
  entries: impl IntoIterator<Item = &'e OverlayEntry>,
  now: DateTime<Utc>,
) -> BTreeSet<String> {
  let mut revoked = BTreeSet::new();
  for entry in entries.into_iter().filter(|e| e.is_live(now)) {
    match entry.action {
      OverlayAction::Grant => {
        baseline.insert(entry.code.clone());
      }
      OverlayAction::Revoke => {
        revoked.insert(entry.code.as_str());
      }
    }
  }
  baseline.retain(|code| !revoked.contains(code.as_str()));
  baseline
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Writes overlays on behalf of an authorized actor.
pub struct Overlays<'a, S> {
  store: &'a S,
  gate:  &'a Gate<'a, S>,
  clock: &'a dyn Clock,
}

impl<'a, S: RecruitStore> Overlays<'a, S> {
  pub fn new(store: &'a S, gate: &'a Gate<'a, S>, clock: &'a dyn Clock) -> Self {
    Self { store, gate, clock }
  }

  /// Grant or revoke `request.code` for `request.subject_id` at
  /// `request.scope`.
  ///
  /// The actor must own the scope's company, be a global admin, or hold
  /// `permissions.manage` at that scope.
  pub async fn upsert(
    &self,
    actor: Option<UserId>,
    request: OverlayRequest,
  ) -> Result<OverlayEntry> {
    let actor_id = self.gate.require_manage(actor, request.scope).await?;

    let now = self.clock.now();
    let code = request.code.trim().to_owned();
    if code.is_empty() {
      return Err(Error::Validation("permission code is empty".into()));
    }
    if self
      .store
      .permission(code.clone())
      .await
      .map_err(Error::store)?
      .is_none()
    {
      return Err(Error::Validation(format!("unknown permission code {code:?}")));
    }
    if request.expires_at.is_some_and(|at| at <= now) {
      return Err(Error::Validation("expiry is not in the future".into()));
    }
    if self
      .store
      .principal(request.subject_id)
      .await
      .map_err(Error::store)?
      .is_none()
    {
      return Err(Error::NotFound(EntityRef::user(request.subject_id)));
    }
    if let Scope::Company(company_id) = request.scope
      && self
        .store
        .company(company_id)
        .await
        .map_err(Error::store)?
        .is_none()
    {
      return Err(Error::NotFound(EntityRef::new(
        EntityKind::Company,
        company_id.0,
      )));
    }

    let upserted = self
      .store
      .upsert_overlay(OverlayUpsert {
        subject_id: request.subject_id,
        scope: request.scope,
        code,
        action: request.action,
        note: request.note,
        granted_by: actor_id,
        expires_at: request.expires_at,
        updated_at: now,
      })
      .await
      .map_err(Error::store)?;

    // Later checks in this request must see the new row.
    self.gate.resolver().forget(request.subject_id);

    let entry = upserted.entry;
    info!(
      subject = %entry.subject_id,
      scope = %entry.scope,
      code = %entry.code,
      action = %entry.action,
      actor = %actor_id,
      "overlay upserted"
    );

    let recorder = HistoryRecorder::new(self.store, self.clock);
    if let Err(e) = recorder
      .record_audit(
        EntityRef::user(entry.subject_id),
        actions::OVERLAY_UPSERTED,
        Some(actor_id),
        upserted.previous.map(|a| a.to_string()),
        Some(entry.action.to_string()),
        json!({
          "scope": entry.scope,
          "code": entry.code,
          "note": entry.note,
          "expires_at": entry.expires_at,
        }),
      )
      .await
    {
      warn!(error = %e, subject = %entry.subject_id, "failed to audit overlay upsert");
    }

    Ok(entry)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn entry(code: &str, action: OverlayAction, expires_at: Option<DateTime<Utc>>) -> OverlayEntry {
    OverlayEntry {
      subject_id: UserId(1),
      scope: Scope::Global,
      code: code.into(),
      action,
      note: None,
      granted_by: UserId(2),
      expires_at,
      updated_at: Utc::now(),
    }
  }

  fn set(codes: &[&str]) -> BTreeSet<String> {
    codes.iter().map(|c| c.to_string()).collect()
  }

  #[test]
  fn grants_extend_baseline() {
    let now = Utc::now();
    let out = apply_overlays(set(&["a"]), &[entry("b", OverlayAction::Grant, None)], now);
    assert_eq!(out, set(&["a", "b"]));
  }

  #[test]
  fn revoke_beats_baseline_and_grant() {
    let now = Utc::now();
    let entries = [
      entry("a", OverlayAction::Revoke, None),
      entry("b", OverlayAction::Grant, None),
      entry("b", OverlayAction::Revoke, None),
    ];
    let out = apply_overlays(set(&["a", "c"]), &entries, now);
    assert_eq!(out, set(&["c"]));
  }

  #[test]
  fn expired_entries_are_inert() {
    let now = Utc::now();
    let past = Some(now - Duration::minutes(1));
    let entries = [
      entry("a", OverlayAction::Revoke, past),
      entry("b", OverlayAction::Grant, past),
    ];
    let out = apply_overlays(set(&["a"]), &entries, now);
    assert_eq!(out, set(&["a"]));
  }

  #[test]
  fn expiry_at_exactly_now_is_not_live() {
    let now = Utc::now();
    assert!(!entry("a", OverlayAction::Grant, Some(now)).is_live(now));
    assert!(entry("a", OverlayAction::Grant, Some(now + Duration::seconds(1))).is_live(now));
    assert!(entry("a", OverlayAction::Grant, None).is_live(now));
  }
}
