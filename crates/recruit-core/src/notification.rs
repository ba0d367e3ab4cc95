//! Notification records and idempotent fan-out.
//!
//! Every notice carries a dedupe key derived from (kind, entity, recipient,
//! disambiguator). The store inserts with insert-or-ignore on that key, so
//! retrying a fan-out never produces a second copy.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
  Error, Result,
  clock::Clock,
  entity::{Application, EntityHead, JobPost},
  ids::{EntityRef, UserId},
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
  NewApplication,
  ApplicationStatusChanged,
  DocumentRequested,
  DocumentStatusChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: i64,
  pub recipient_id:    UserId,
  pub kind:            NotificationKind,
  pub entity:          EntityRef,
  pub dedupe_key:      String,
  pub payload:         serde_json::Value,
  pub is_read:         bool,
  pub created_at:      DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
  pub recipient_id: UserId,
  pub kind:         NotificationKind,
  pub entity:       EntityRef,
  pub dedupe_key:   String,
  pub payload:      serde_json::Value,
  pub created_at:   DateTime<Utc>,
}

/// Stable dedupe key: hex SHA-256 over the identifying fields.
pub fn dedupe_key(
  kind: NotificationKind,
  entity: EntityRef,
  recipient: UserId,
  disambiguator: Option<&str>,
) -> String {
  let mut hasher = Sha256::new();
  hasher.update(kind.as_ref().as_bytes());
  hasher.update(b"\0");
  hasher.update(entity.kind.as_ref().as_bytes());
  hasher.update(b"\0");
  hasher.update(entity.id.to_string().as_bytes());
  hasher.update(b"\0");
  hasher.update(recipient.0.to_string().as_bytes());
  if let Some(extra) = disambiguator {
    hasher.update(b"\0");
    hasher.update(extra.as_bytes());
  }
  hex::encode(hasher.finalize())
}

/// Outcome of one [`Fanout::fanout`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
  pub inserted:   usize,
  /// Recipients that already had this notice.
  pub duplicates: usize,
}

pub struct Fanout<'a, S> {
  store: &'a S,
  clock: &'a dyn Clock,
}

impl<'a, S: RecruitStore> Fanout<'a, S> {
  pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self { Self { store, clock } }

  /// Enqueue one notice per recipient. Safe to repeat.
  pub async fn fanout(
    &self,
    kind: NotificationKind,
    entity: EntityRef,
    recipients: &[UserId],
    payload: &serde_json::Value,
    disambiguator: Option<&str>,
  ) -> Result<FanoutReport> {
    let mut report = FanoutReport::default();
    let now = self.clock.now();
    for &recipient_id in recipients {
      let inserted = self
        .store
        .insert_notification(NewNotification {
          recipient_id,
          kind,
          entity,
          dedupe_key: dedupe_key(kind, entity, recipient_id, disambiguator),
          payload: payload.clone(),
          created_at: now,
        })
        .await
        .map_err(Error::store)?;
      if inserted {
        report.inserted += 1;
      } else {
        report.duplicates += 1;
      }
    }
    debug!(%kind, %entity, ?report, "fanout complete");
    Ok(report)
  }

  /// Reviewers of the company plus the job post's creator, minus the
  /// applicant.
  pub async fn new_application_recipients(
    &self,
    application: &Application,
    job_post: &JobPost,
  ) -> Result<Vec<UserId>> {
    let mut recipients: BTreeSet<UserId> = self
      .store
      .reviewers(application.company_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .collect();
    recipients.insert(job_post.created_by);
    recipients.remove(&application.applicant_id);
    Ok(recipients.into_iter().collect())
  }

  /// The owner, unless the owner caused the change; then the company's
  /// reviewers and the assigned reviewer.
  pub async fn status_change_recipients(
    &self,
    head: &EntityHead,
    actor: Option<UserId>,
  ) -> Result<Vec<UserId>> {
    if actor != Some(head.owner_id) {
      return Ok(vec![head.owner_id]);
    }
    let mut recipients: BTreeSet<UserId> = self
      .store
      .reviewers(head.company_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .collect();
    recipients.extend(head.reviewer_id);
    recipients.remove(&head.owner_id);
    Ok(recipients.into_iter().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dedupe_key_is_stable_and_hex() {
    let a = dedupe_key(
      NotificationKind::ApplicationStatusChanged,
      EntityRef::application(7),
      UserId(3),
      Some("41"),
    );
    let b = dedupe_key(
      NotificationKind::ApplicationStatusChanged,
      EntityRef::application(7),
      UserId(3),
      Some("41"),
    );
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn dedupe_key_separates_every_field() {
    let base = dedupe_key(
      NotificationKind::ApplicationStatusChanged,
      EntityRef::application(7),
      UserId(3),
      Some("41"),
    );
    let variants = [
      dedupe_key(
        NotificationKind::NewApplication,
        EntityRef::application(7),
        UserId(3),
        Some("41"),
      ),
      dedupe_key(
        NotificationKind::ApplicationStatusChanged,
        EntityRef::application(8),
        UserId(3),
        Some("41"),
      ),
      dedupe_key(
        NotificationKind::ApplicationStatusChanged,
        EntityRef::application(7),
        UserId(4),
        Some("41"),
      ),
      dedupe_key(
        NotificationKind::ApplicationStatusChanged,
        EntityRef::application(7),
        UserId(3),
        Some("42"),
      ),
      dedupe_key(
        NotificationKind::ApplicationStatusChanged,
        EntityRef::application(7),
        UserId(3),
        None,
      ),
    ];
    for v in variants {
      assert_ne!(v, base);
    }
  }

  #[test]
  fn field_boundaries_do_not_collide() {
    // entity 1, recipient 23 vs entity 12, recipient 3
    let a = dedupe_key(
      NotificationKind::NewApplication,
      EntityRef::application(1),
      UserId(23),
      None,
    );
    let b = dedupe_key(
      NotificationKind::NewApplication,
      EntityRef::application(12),
      UserId(3),
      None,
    );
    assert_ne!(a, b);
  }
}
