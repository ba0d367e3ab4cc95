//! Storage traits consumed by the engine.
//!
//! [`Directory`] is the read-only view of leaf data owned elsewhere. The other
//! traits cover the state the core owns: overlays, lifecycle entities,
//! history and notifications. Backends (e.g. `recruit-store-sqlite`)
//! implement all of them and get [`RecruitStore`] for free.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use crate::{
  directory::{
    Company, Credentials, Membership, PermissionCode, Position, Principal,
    Role,
  },
  entity::{
    Application, DocumentRequest, EntityHead, JobPost, NewApplication,
    NewDocumentRequest, StatusSwap, SwapOutcome,
  },
  history::{AuditEvent, NewAuditEvent, NewStatusHistory, StatusHistory},
  ids::{CompanyId, EntityRef, PositionId, RoleId, UserId},
  notification::{NewNotification, Notification},
  overlay::{OverlayEntry, OverlayUpsert, UpsertedOverlay},
  scope::Scope,
};

/// Shared error type for every store trait of a backend.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Leaf data ───────────────────────────────────────────────────────────────

pub trait Directory: Backend {
  fn principal(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + '_;

  fn credentials(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  fn role(
    &self,
    role_id: RoleId,
  ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send + '_;

  fn company(
    &self,
    company_id: CompanyId,
  ) -> impl Future<Output = Result<Option<Company>, Self::Error>> + Send + '_;

  /// The single membership row for (user, company), if any.
  fn membership(
    &self,
    user_id: UserId,
    company_id: CompanyId,
  ) -> impl Future<Output = Result<Option<Membership>, Self::Error>> + Send + '_;

  fn position(
    &self,
    position_id: PositionId,
  ) -> impl Future<Output = Result<Option<Position>, Self::Error>> + Send + '_;

  fn permission(
    &self,
    code: String,
  ) -> impl Future<Output = Result<Option<PermissionCode>, Self::Error>> + Send + '_;

  /// The full permission catalog.
  fn permissions(
    &self,
  ) -> impl Future<Output = Result<Vec<PermissionCode>, Self::Error>> + Send + '_;

  /// Position-tagged staff: active, approved members holding a position.
  fn reviewers(
    &self,
    company_id: CompanyId,
  ) -> impl Future<Output = Result<Vec<UserId>, Self::Error>> + Send + '_;
}

// ─── Overlays ────────────────────────────────────────────────────────────────

pub trait OverlayStore: Backend {
  /// Insert or replace the single row keyed by (subject, scope, code).
  /// Returns the stored row and the action it replaced, if any.
  fn upsert_overlay(
    &self,
    input: OverlayUpsert,
  ) -> impl Future<Output = Result<UpsertedOverlay, Self::Error>> + Send + '_;

  /// Every entry for (user, scope), expired ones included.
  fn overlays_for(
    &self,
    user_id: UserId,
    scope: Scope,
  ) -> impl Future<Output = Result<Vec<OverlayEntry>, Self::Error>> + Send + '_;
}

// ─── Lifecycle entities ──────────────────────────────────────────────────────

pub trait LifecycleStore: Backend {
  fn entity_head(
    &self,
    entity: EntityRef,
  ) -> impl Future<Output = Result<Option<EntityHead>, Self::Error>> + Send + '_;

  /// Write `swap.next` only if the stored status equals `swap.expected`. Any
  /// counter adjustment is applied in the same atomic unit when the backend
  /// supports it.
  fn compare_and_swap(
    &self,
    swap: StatusSwap,
  ) -> impl Future<Output = Result<SwapOutcome, Self::Error>> + Send + '_;

  fn job_post(
    &self,
    job_post_id: i64,
  ) -> impl Future<Output = Result<Option<JobPost>, Self::Error>> + Send + '_;

  fn application(
    &self,
    application_id: i64,
  ) -> impl Future<Output = Result<Option<Application>, Self::Error>> + Send + '_;

  /// Returns `None` if the applicant already applied to that job post.
  fn insert_application(
    &self,
    input: NewApplication,
  ) -> impl Future<Output = Result<Option<Application>, Self::Error>> + Send + '_;

  fn set_reviewer(
    &self,
    application_id: i64,
    reviewer_id: Option<UserId>,
    at: chrono::DateTime<chrono::Utc>,
  ) -> impl Future<Output = Result<Option<Application>, Self::Error>> + Send + '_;

  fn document_request(
    &self,
    document_request_id: i64,
  ) -> impl Future<Output = Result<Option<DocumentRequest>, Self::Error>> + Send + '_;

  fn insert_document_request(
    &self,
    input: NewDocumentRequest,
  ) -> impl Future<Output = Result<DocumentRequest, Self::Error>> + Send + '_;
}

// ─── History ─────────────────────────────────────────────────────────────────

/// Append-only ledgers. No method updates or deletes a row.
pub trait HistoryStore: Backend {
  fn append_status_history(
    &self,
    input: NewStatusHistory,
  ) -> impl Future<Output = Result<StatusHistory, Self::Error>> + Send + '_;

  /// Newest first.
  fn status_history(
    &self,
    entity: EntityRef,
  ) -> impl Future<Output = Result<Vec<StatusHistory>, Self::Error>> + Send + '_;

  fn append_audit(
    &self,
    input: NewAuditEvent,
  ) -> impl Future<Output = Result<AuditEvent, Self::Error>> + Send + '_;

  /// Newest first.
  fn audit_trail(
    &self,
    entity: EntityRef,
  ) -> impl Future<Output = Result<Vec<AuditEvent>, Self::Error>> + Send + '_;
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub trait NotificationStore: Backend {
  /// Insert-or-ignore on the dedupe key. Returns `true` if a row was written.
  fn insert_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Newest first.
  fn notifications_for(
    &self,
    recipient_id: UserId,
    unread_only: bool,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Returns `false` if no such notification belongs to `recipient_id`.
  fn mark_notification_read(
    &self,
    recipient_id: UserId,
    notification_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

/// Everything the engine needs from a backend.
pub trait RecruitStore:
  Directory + OverlayStore + LifecycleStore + HistoryStore + NotificationStore
{
}

impl<T> RecruitStore for T where
  T: Directory + OverlayStore + LifecycleStore + HistoryStore + NotificationStore
{
}
