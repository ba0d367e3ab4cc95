//! HTTP Basic-auth actor extractor.
//!
//! A request without an `Authorization` header is the anonymous actor. A
//! header that is present but malformed, names an unknown user, or carries
//! the wrong password is rejected with 401 before any handler runs.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use recruit_core::{ids::UserId, store::RecruitStore};
use tracing::debug;

use crate::{AppState, error::ApiError};

/// The caller on whose behalf a request runs; `None` when anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Option<UserId>);

impl Actor {
  /// The signed-in user, or 401.
  pub fn required(self) -> Result<UserId, ApiError> {
    self.0.ok_or(ApiError::Unauthorized)
  }
}

/// Split a `Basic` header into `(username, password)`.
///
/// `Ok(None)` means no header was sent.
pub fn basic_credentials(
  headers: &HeaderMap,
) -> Result<Option<(String, String)>, ApiError> {
  let Some(value) = headers.get(header::AUTHORIZATION) else {
    return Ok(None);
  };
  let value = value.to_str().map_err(|_| ApiError::Unauthorized)?;
  let encoded = value.strip_prefix("Basic ").ok_or(ApiError::Unauthorized)?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) =
    creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok(Some((username.to_owned(), password.to_owned())))
}

/// Check a password against an argon2 PHC string.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc).is_ok_and(|parsed| {
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed)
      .is_ok()
  })
}

impl<S> FromRequestParts<AppState<S>> for Actor
where
  S: RecruitStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let Some((username, password)) = basic_credentials(&parts.headers)? else {
      return Ok(Actor(None));
    };
    let creds = state
      .store
      .credentials(username.clone())
      .await
      .map_err(ApiError::store)?
      .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&password, &creds.password_hash) {
      debug!(%username, "rejected credentials");
      return Err(ApiError::Unauthorized);
    }
    Ok(Actor(Some(creds.user_id)))
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{HeaderValue, Request};
  use rand_core::OsRng;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn missing_header_is_anonymous() {
    let req = Request::builder().body(()).unwrap();
    assert!(basic_credentials(req.headers()).unwrap().is_none());
  }

  #[test]
  fn basic_header_is_split_on_first_colon() {
    let h = headers(&format!("Basic {}", B64.encode("ada:pa:ss")));
    let (user, pass) = basic_credentials(&h).unwrap().unwrap();
    assert_eq!(user, "ada");
    assert_eq!(pass, "pa:ss");
  }

  #[test]
  fn malformed_headers_are_rejected() {
    for value in ["Bearer abc", "Basic !!!not-base64!!!"] {
      assert!(matches!(
        basic_credentials(&headers(value)),
        Err(ApiError::Unauthorized)
      ));
    }
    let no_colon = headers(&format!("Basic {}", B64.encode("ada")));
    assert!(basic_credentials(&no_colon).is_err());
  }

  #[test]
  fn password_verification() {
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();
    assert!(verify_password("secret", &phc));
    assert!(!verify_password("wrong", &phc));
    assert!(!verify_password("secret", "not a phc string"));
  }
}
