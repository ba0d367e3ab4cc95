//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use recruit_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Credentials were supplied but did not check out, or an operation needs
  /// a signed-in actor.
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Core(CoreError::store(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = self.to_string();
    let (status, body) = match self {
      ApiError::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": message })))
            .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"recruit\""),
        );
        return res;
      }
      ApiError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
      ApiError::Core(e) => match e {
        CoreError::AuthorizationDenied { code, scope, .. } => (
          StatusCode::FORBIDDEN,
          json!({ "error": message, "code": code, "scope": scope }),
        ),
        CoreError::InvalidTransition { from, to, .. } => (
          StatusCode::CONFLICT,
          json!({ "error": message, "from": from, "to": to }),
        ),
        CoreError::ConcurrentModification { expected, actual, .. } => (
          StatusCode::CONFLICT,
          json!({ "error": message, "expected": expected, "actual": actual }),
        ),
        CoreError::NotFound(_) => {
          (StatusCode::NOT_FOUND, json!({ "error": message }))
        }
        CoreError::Validation(_) => {
          (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": message }))
        }
        CoreError::Serialization(_) | CoreError::Store(_) => {
          error!(error = %message, "request failed");
          (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "internal error" }),
          )
        }
      },
    };
    (status, Json(body)).into_response()
  }
}
