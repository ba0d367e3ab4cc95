//! JSON REST API for the recruitment core.
//!
//! Exposes an axum [`Router`] backed by any [`RecruitStore`]. Every request
//! resolves permissions through its own [`Gate`], so cached effective sets
//! never outlive the request. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", recruit_api::api_router(store.clone(), clock))
//! ```

pub mod applications;
pub mod auth;
pub mod error;
pub mod notifications;
pub mod permissions;
pub mod transitions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use recruit_core::{
  clock::Clock,
  gate::Gate,
  lifecycle::Lifecycle,
  status::{ApplicationStatus, DocumentStatus, JobPostStatus},
  store::RecruitStore,
};

pub use auth::Actor;
pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store: Arc<S>,
  pub clock: Arc<dyn Clock>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), clock: Arc::clone(&self.clock) }
  }
}

impl<S: RecruitStore> AppState<S> {
  /// A gate with an empty memo, for one request.
  pub fn gate(&self) -> Gate<'_, S> { Gate::new(&self.store, self.clock.as_ref()) }

  pub fn lifecycle<'a>(&'a self, gate: &'a Gate<'a, S>) -> Lifecycle<'a, S> {
    Lifecycle::new(&self.store, gate, self.clock.as_ref())
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Router<()>
where
  S: RecruitStore + 'static,
{
  Router::new()
    // Permissions
    .route("/permissions/effective", get(permissions::effective::<S>))
    .route("/permissions/check", get(permissions::check::<S>))
    .route("/permissions/overlays", put(permissions::upsert_overlay::<S>))
    // Job posts
    .route(
      "/job-posts/{id}/applications",
      post(applications::submit::<S>),
    )
    .route(
      "/job-posts/{id}/status",
      post(transitions::update::<S, JobPostStatus>),
    )
    .route(
      "/job-posts/{id}/history",
      get(transitions::timeline::<S, JobPostStatus>),
    )
    // Applications
    .route("/applications/{id}", get(applications::get_one::<S>))
    .route(
      "/applications/{id}/status",
      post(transitions::update::<S, ApplicationStatus>),
    )
    .route(
      "/applications/{id}/history",
      get(transitions::timeline::<S, ApplicationStatus>),
    )
    .route("/applications/{id}/reviewer", put(applications::assign::<S>))
    .route(
      "/applications/{id}/documents",
      post(applications::request_document::<S>),
    )
    // Documents
    .route(
      "/documents/{id}/status",
      post(transitions::update::<S, DocumentStatus>),
    )
    .route(
      "/documents/{id}/history",
      get(transitions::timeline::<S, DocumentStatus>),
    )
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    .with_state(AppState { store, clock })
}

#[cfg(test)]
mod tests;
