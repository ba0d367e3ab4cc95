//! Status changes and timelines, shared by every lifecycle entity.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/<entity>/:id/status` | Body: `{"status":"…","note":"…"}` |
//! | `GET`  | `/<entity>/:id/history` | Newest first; notes hidden from non-staff |

use axum::{
  Json,
  extract::{Path, State},
};
use recruit_core::{
  history::{HistoryRecorder, StatusHistory},
  ids::EntityRef,
  lifecycle::Transition,
  status::StateMachine,
  store::RecruitStore,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{AppState, auth::Actor, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(bound = "M: DeserializeOwned")]
pub struct StatusBody<M> {
  pub status: M,
  pub note:   Option<String>,
}

/// `POST /<entity>/:id/status`
///
/// Losing a race to a concurrent writer is reported as a conflict carrying
/// the winner's status.
pub async fn update<S, M>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Path(id): Path<i64>,
  Json(body): Json<StatusBody<M>>,
) -> Result<Json<Transition<M>>, ApiError>
where
  S: RecruitStore + 'static,
  M: StateMachine + Serialize + DeserializeOwned,
{
  let gate = state.gate();
  let outcome = state
    .lifecycle(&gate)
    .transition(id, actor, body.status, body.note)
    .await?
    .into_committed(EntityRef::new(M::ENTITY, id))?;
  Ok(Json(outcome))
}

/// `GET /<entity>/:id/history`
pub async fn timeline<S, M>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Path(id): Path<i64>,
) -> Result<Json<Vec<StatusHistory>>, ApiError>
where
  S: RecruitStore + 'static,
  M: StateMachine,
{
  let gate = state.gate();
  let rows = HistoryRecorder::new(&*state.store, state.clock.as_ref())
    .timeline(&gate, actor, EntityRef::new(M::ENTITY, id))
    .await?;
  Ok(Json(rows))
}
