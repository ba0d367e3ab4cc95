//! Handlers for the caller's notification inbox.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/notifications` | Optional `?unread_only=true` |
//! | `POST` | `/notifications/:id/read` | 404 unless the notice is the caller's |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use recruit_core::{notification::Notification, store::RecruitStore};
use serde::Deserialize;

use crate::{AppState, auth::Actor, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub unread_only: bool,
}

/// `GET /notifications[?unread_only=true]`
pub async fn list<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError> {
  let recipient = actor.required()?;
  let notifications = state
    .store
    .notifications_for(recipient, params.unread_only)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(notifications))
}

/// `POST /notifications/:id/read`
pub async fn mark_read<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
  let recipient = actor.required()?;
  let found = state
    .store
    .mark_notification_read(recipient, id)
    .await
    .map_err(ApiError::store)?;
  if found {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("notification {id}")))
  }
}
