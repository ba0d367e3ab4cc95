//! Handlers for `/permissions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/permissions/effective` | Optional `?company_id=<id>` |
//! | `GET`  | `/permissions/check` | `?code=<code>[&company_id=<id>]` |
//! | `PUT`  | `/permissions/overlays` | Body: an overlay request |

use axum::{
  Json,
  extract::{Query, State},
};
use recruit_core::{
  ids::CompanyId,
  overlay::{OverlayEntry, OverlayRequest, Overlays},
  scope::Scope,
  store::RecruitStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::Actor, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ScopeParams {
  pub company_id: Option<CompanyId>,
}

#[derive(Debug, Serialize)]
pub struct EffectiveSet {
  pub scope: Scope,
  pub codes: Vec<String>,
}

/// `GET /permissions/effective[?company_id=<id>]`: the caller's own codes.
pub async fn effective<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Query(params): Query<ScopeParams>,
) -> Result<Json<EffectiveSet>, ApiError> {
  let scope = Scope::from(params.company_id);
  let gate = state.gate();
  let codes = gate.resolver().effective_set(actor, scope).await;
  Ok(Json(EffectiveSet { scope, codes: codes.iter().cloned().collect() }))
}

#[derive(Debug, Deserialize)]
pub struct CheckParams {
  pub code:       String,
  pub company_id: Option<CompanyId>,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
  pub code:    String,
  pub scope:   Scope,
  pub allowed: bool,
}

/// `GET /permissions/check?code=<code>[&company_id=<id>]`
pub async fn check<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Query(params): Query<CheckParams>,
) -> Result<Json<CheckResult>, ApiError> {
  let scope = Scope::from(params.company_id);
  let allowed = state.gate().allows(actor, &params.code, scope).await;
  Ok(Json(CheckResult { code: params.code, scope, allowed }))
}

/// `PUT /permissions/overlays`: grant or revoke a code for another user.
pub async fn upsert_overlay<S: RecruitStore + 'static>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  Json(body): Json<OverlayRequest>,
) -> Result<Json<OverlayEntry>, ApiError> {
  let gate = state.gate();
  let entry = Overlays::new(&*state.store, &gate, state.clock.as_ref())
    .upsert(actor, body)
    .await?;
  Ok(Json(entry))
}
