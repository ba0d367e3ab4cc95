//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;
use recruit_core::{
  clock::SystemClock,
  directory::{
    ApprovalStatus, Company, Membership, PermissionCode, Position, Principal,
    Role, RoleScope, Visibility, codes,
  },
  entity::NewJobPost,
  ids::{CompanyId, PositionId, RoleId, UserId},
  status::JobPostStatus,
};
use recruit_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::api_router;

const PASSWORD: &str = "hunter2";

struct TestApp {
  router:      Router,
  job_post_id: i64,
}

fn permission(code: &str, scope: RoleScope, visibility: Visibility) -> PermissionCode {
  PermissionCode {
    code: code.into(),
    category: "test".into(),
    scope,
    min_role: None,
    visibility,
  }
}

/// owner(1) owns company 1; recruiter(2) holds a position there;
/// applicant(3) may apply; outsider(4) has nothing.
async fn make_app() -> TestApp {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(PASSWORD.as_bytes(), &salt)
    .unwrap()
    .to_string();

  store
    .put_permission(permission("job_post.view", RoleScope::Global, Visibility::Public))
    .await
    .unwrap();
  store
    .put_permission(permission(
      codes::APPLICATION_SUBMIT,
      RoleScope::Global,
      Visibility::Listed,
    ))
    .await
    .unwrap();
  for code in [
    codes::PERMISSIONS_MANAGE,
    codes::APPLICATION_STATUS_UPDATE,
    codes::APPLICATION_ASSIGN,
    codes::APPLICATION_VIEW_INTERNAL,
    codes::JOB_POST_MANAGE,
    codes::DOCUMENT_REVIEW,
  ] {
    store
      .put_permission(permission(code, RoleScope::Company, Visibility::Listed))
      .await
      .unwrap();
  }
  store
    .put_role(Role {
      role_id:     RoleId(1),
      scope:       RoleScope::Global,
      name:        "applicant".into(),
      permissions: vec![codes::APPLICATION_SUBMIT.into()],
    })
    .await
    .unwrap();

  for (id, name, role) in [
    (1, "owner", None),
    (2, "recruiter", None),
    (3, "applicant", Some(RoleId(1))),
    (4, "outsider", None),
  ] {
    store
      .put_user(
        Principal {
          user_id:        UserId(id),
          username:       name.into(),
          global_role_id: role,
        },
        Some(hash.clone()),
      )
      .await
      .unwrap();
  }

  store
    .put_company(Company {
      company_id: CompanyId(1),
      name:       "Acme".into(),
      owner_id:   UserId(1),
    })
    .await
    .unwrap();
  store
    .put_position(Position::new(PositionId(1), CompanyId(1), "recruiter", [
      codes::APPLICATION_STATUS_UPDATE,
      codes::APPLICATION_VIEW_INTERNAL,
      codes::DOCUMENT_REVIEW,
    ]))
    .await
    .unwrap();
  store
    .put_membership(Membership {
      user_id:     UserId(2),
      company_id:  CompanyId(1),
      role_id:     None,
      position_id: Some(PositionId(1)),
      approval:    ApprovalStatus::Approved,
      active:      true,
    })
    .await
    .unwrap();

  let post = store
    .insert_job_post(NewJobPost {
      company_id: CompanyId(1),
      created_by: UserId(1),
      title:      "Backend engineer".into(),
      status:     JobPostStatus::Published,
    })
    .await
    .unwrap();

  TestApp {
    router:      api_router(Arc::new(store), Arc::new(SystemClock)),
    job_post_id: post.job_post_id,
  }
}

fn basic(user: &str) -> String {
  format!("Basic {}", B64.encode(format!("{user}:{PASSWORD}")))
}

async fn call(
  app: &TestApp,
  method: &str,
  uri: &str,
  user: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(user) = user {
    builder = builder.header(header::AUTHORIZATION, basic(user));
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let resp = app.router.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn submit(app: &TestApp) -> i64 {
  let uri = format!("/job-posts/{}/applications", app.job_post_id);
  let (status, body) =
    call(app, "POST", &uri, Some("applicant"), Some(json!({ "cover_note": "hi" })))
      .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["status"], "submitted");
  body["application_id"].as_i64().unwrap()
}

// ─── Authentication ──────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_sees_public_codes_only() {
  let app = make_app().await;
  let (status, body) =
    call(&app, "GET", "/permissions/effective?company_id=1", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["codes"], json!(["job_post.view"]));
}

#[tokio::test]
async fn bad_password_is_401_with_challenge() {
  let app = make_app().await;
  let req = Request::builder()
    .uri("/permissions/effective")
    .header(
      header::AUTHORIZATION,
      format!("Basic {}", B64.encode("owner:wrong")),
    )
    .body(Body::empty())
    .unwrap();
  let resp = app.router.clone().oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn anonymous_cannot_apply() {
  let app = make_app().await;
  let uri = format!("/job-posts/{}/applications", app.job_post_id);
  let (status, _) = call(&app, "POST", &uri, None, Some(json!({}))).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn recruiter_moves_application_forward() {
  let app = make_app().await;
  let id = submit(&app).await;

  let (status, body) = call(
    &app,
    "POST",
    &format!("/applications/{id}/status"),
    Some("recruiter"),
    Some(json!({ "status": "under_review", "note": "promising" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["outcome"], "committed");
  assert_eq!(body["from"], "submitted");
  assert_eq!(body["to"], "under_review");

  let (status, inbox) =
    call(&app, "GET", "/notifications?unread_only=true", Some("applicant"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(inbox.as_array().unwrap().len(), 1);
  assert_eq!(inbox[0]["kind"], "application_status_changed");

  let (_, history) = call(
    &app,
    "GET",
    &format!("/applications/{id}/history"),
    Some("applicant"),
    None,
  )
  .await;
  assert_eq!(history.as_array().unwrap().len(), 1);
  assert_eq!(history[0]["note"], Value::Null);
}

#[tokio::test]
async fn illegal_edge_is_409_with_endpoints() {
  let app = make_app().await;
  let id = submit(&app).await;
  let (status, body) = call(
    &app,
    "POST",
    &format!("/applications/{id}/status"),
    Some("owner"),
    Some(json!({ "status": "hired" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["from"], "submitted");
  assert_eq!(body["to"], "hired");
}

#[tokio::test]
async fn outsider_is_403_with_code() {
  let app = make_app().await;
  let id = submit(&app).await;
  let (status, body) = call(
    &app,
    "POST",
    &format!("/applications/{id}/status"),
    Some("outsider"),
    Some(json!({ "status": "under_review" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["code"], codes::APPLICATION_STATUS_UPDATE);

  let (status, _) =
    call(&app, "GET", &format!("/applications/{id}"), Some("outsider"), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) =
    call(&app, "GET", &format!("/applications/{id}"), Some("applicant"), None).await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn overlay_grant_unlocks_an_operation() {
  let app = make_app().await;
  let id = submit(&app).await;
  let check = "/permissions/check?code=application.status.update&company_id=1";

  let (_, body) = call(&app, "GET", check, Some("outsider"), None).await;
  assert_eq!(body["allowed"], false);

  let (status, body) = call(
    &app,
    "PUT",
    "/permissions/overlays",
    Some("owner"),
    Some(json!({
      "subject_id": 4,
      "scope": { "kind": "company", "company_id": 1 },
      "code": codes::APPLICATION_STATUS_UPDATE,
      "action": "grant",
      "note": "covering for a colleague",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["action"], "grant");

  let (_, body) = call(&app, "GET", check, Some("outsider"), None).await;
  assert_eq!(body["allowed"], true);

  let (status, _) = call(
    &app,
    "POST",
    &format!("/applications/{id}/status"),
    Some("outsider"),
    Some(json!({ "status": "under_review" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn withdraw_twice_is_rejected() {
  let app = make_app().await;
  let id = submit(&app).await;
  let uri = format!("/applications/{id}/status");
  let withdraw = json!({ "status": "withdrawn" });

  let (status, _) = call(&app, "POST", &uri, Some("applicant"), Some(withdraw.clone())).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = call(&app, "POST", &uri, Some("applicant"), Some(withdraw)).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn empty_document_name_is_422() {
  let app = make_app().await;
  let id = submit(&app).await;
  let (status, _) = call(
    &app,
    "POST",
    &format!("/applications/{id}/documents"),
    Some("recruiter"),
    Some(json!({ "name": "   " })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_application_is_404() {
  let app = make_app().await;
  let (status, _) = call(
    &app,
    "POST",
    "/applications/999/status",
    Some("recruiter"),
    Some(json!({ "status": "under_review" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn only_the_recipient_can_mark_read() {
  let app = make_app().await;
  submit(&app).await;

  let (_, inbox) = call(&app, "GET", "/notifications", Some("recruiter"), None).await;
  let nid = inbox[0]["notification_id"].as_i64().unwrap();
  let uri = format!("/notifications/{nid}/read");

  let (status, _) = call(&app, "POST", &uri, Some("applicant"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = call(&app, "POST", &uri, Some("recruiter"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, unread) =
    call(&app, "GET", "/notifications?unread_only=true", Some("recruiter"), None).await;
  assert!(unread.as_array().unwrap().is_empty());
}
