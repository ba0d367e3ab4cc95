//! Lifecycle entities: job posts, applications and document requests, plus
//! the storage-facing records the state machine exchanges with a backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  ids::{CompanyId, EntityRef, UserId},
  status::{ApplicationStatus, DocumentStatus, JobPostStatus},
};

// ─── Job post ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPost {
  pub job_post_id:         i64,
  pub company_id:          CompanyId,
  pub created_by:          UserId,
  pub title:               String,
  pub status:              JobPostStatus,
  /// Denormalised count of applications in an active status. Derived data:
  /// it can always be rebuilt from status history.
  pub active_applications: i64,
  pub created_at:          DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJobPost {
  pub company_id: CompanyId,
  pub created_by: UserId,
  pub title:      String,
  pub status:     JobPostStatus,
}

// ─── Application ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
  pub application_id: i64,
  pub company_id:     CompanyId,
  pub job_post_id:    i64,
  pub applicant_id:   UserId,
  pub status:         ApplicationStatus,
  pub reviewer_id:    Option<UserId>,
  pub cover_note:     Option<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::LifecycleStore::insert_application`]. The status
/// is always `submitted`; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewApplication {
  pub company_id:   CompanyId,
  pub job_post_id:  i64,
  pub applicant_id: UserId,
  pub cover_note:   Option<String>,
  pub created_at:   DateTime<Utc>,
  /// Bump the job post's active counter in the same write.
  pub count_active: bool,
}

// ─── Document request ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequest {
  pub document_request_id: i64,
  pub application_id:      i64,
  pub company_id:          CompanyId,
  pub applicant_id:        UserId,
  pub name:                String,
  pub status:              DocumentStatus,
  pub requested_by:        UserId,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocumentRequest {
  pub application_id: i64,
  pub company_id:     CompanyId,
  pub applicant_id:   UserId,
  pub name:           String,
  pub requested_by:   UserId,
  pub created_at:     DateTime<Utc>,
}

// ─── State machine plumbing ──────────────────────────────────────────────────

/// The part of any lifecycle entity a transition needs to see.
#[derive(Debug, Clone)]
pub struct EntityHead {
  pub entity:      EntityRef,
  pub company_id:  CompanyId,
  /// Applicant for applications and documents, creator for job posts.
  pub owner_id:    UserId,
  /// The job post whose counter tracks this entity, if any.
  pub job_post_id: Option<i64>,
  /// Reviewer assigned to the application this entity belongs to.
  pub reviewer_id: Option<UserId>,
  /// Raw stored status; parsed by the caller's machine.
  pub status:      String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterAdjustment {
  pub job_post_id: i64,
  pub delta:       i64,
}

/// A conditional status write: succeeds only if the stored status still
/// equals `expected`.
#[derive(Debug, Clone)]
pub struct StatusSwap {
  pub entity:   EntityRef,
  pub expected: String,
  pub next:     String,
  pub counter:  Option<CounterAdjustment>,
  pub at:       DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
  Applied,
  /// Another writer got there first; `current` is what it left behind.
  Conflict { current: String },
  Missing,
}
