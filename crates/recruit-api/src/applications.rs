//! Handlers for application endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/job-posts/:id/applications` | Body: `{"cover_note":"…"}` |
//! | `GET`  | `/applications/:id` | Applicant or staff only |
//! | `PUT`  | `/applications/:id/reviewer` | Body: `{"reviewer_id":3}` or `null` |
//! | `POST` | `/applications/:id/documents` | Body: `{"name":"passport"}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use recruit_core::{
  Error as CoreError,
  directory::codes,
  entity::Application,
  ids::{EntityRef, UserId},
  scope::Scope,
  store::RecruitStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Actor, error::ApiError};

// ─── Submit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SubmitBody {
  pub cover_note: Option<String>,
}

/// `POST /job-posts/:id/applications`
pub async fn submit<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(job_post_id): Path<i64>,
  Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, ApiError> {
  let actor = actor.required()?;
  let gate = state.gate();
  let application = state
    .lifecycle(&gate)
    .submit(Some(actor), job_post_id, body.cover_note)
    .await?;
  Ok((StatusCode::CREATED, Json(application)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /applications/:id`
pub async fn get_one<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Path(id): Path<i64>,
) -> Result<Json<Application>, ApiError> {
  let application = state
    .store
    .application(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::NotFound(EntityRef::application(id)))?;

  if actor != Some(application.applicant_id) {
    let scope = Scope::Company(application.company_id);
    state
      .gate()
      .require(actor, codes::APPLICATION_VIEW_INTERNAL, scope)
      .await?;
  }
  Ok(Json(application))
}

// ─── Reviewer ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReviewerBody {
  pub reviewer_id: Option<UserId>,
}

/// `PUT /applications/:id/reviewer`
pub async fn assign<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Path(id): Path<i64>,
  Json(body): Json<ReviewerBody>,
) -> Result<Json<Application>, ApiError> {
  let gate = state.gate();
  let application = state
    .lifecycle(&gate)
    .assign_reviewer(actor, id, body.reviewer_id)
    .await?;
  Ok(Json(application))
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DocumentBody {
  pub name: String,
}

/// `POST /applications/:id/documents`
pub async fn request_document<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Path(id): Path<i64>,
  Json(body): Json<DocumentBody>,
) -> Result<impl IntoResponse, ApiError> {
  let gate = state.gate();
  let document = state
    .lifecycle(&gate)
    .request_document(actor, id, &body.name)
    .await?;
  Ok((StatusCode::CREATED, Json(document)))
}
