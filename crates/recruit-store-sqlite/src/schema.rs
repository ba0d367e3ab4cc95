//! SQL schema for the recruitment store.
//!
//! Migrations are applied in order at connection startup and tracked in
//! `PRAGMA user_version`. What the resulting schema supports is captured once
//! in [`Capabilities`], so no query has to probe the database for optional
//! columns.

use rusqlite::Connection;

/// Connection-level settings. Not part of any migration.
const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Version 1: leaf data, overlays, lifecycle entities and the ledgers.
const V1: &str = "
CREATE TABLE IF NOT EXISTS roles (
    role_id     INTEGER PRIMARY KEY,
    scope       TEXT NOT NULL CHECK (scope IN ('global', 'company')),
    name        TEXT NOT NULL,
    permissions TEXT NOT NULL DEFAULT '[]'   -- JSON array of codes
);

CREATE TABLE IF NOT EXISTS users (
    user_id        INTEGER PRIMARY KEY,
    username       TEXT NOT NULL UNIQUE,
    password_hash  TEXT,                     -- argon2 PHC string
    global_role_id INTEGER REFERENCES roles(role_id)
);

-- Id 0 is the global scope and never names a company.
CREATE TABLE IF NOT EXISTS companies (
    company_id INTEGER PRIMARY KEY CHECK (company_id > 0),
    name       TEXT NOT NULL,
    owner_id   INTEGER NOT NULL REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS positions (
    position_id INTEGER PRIMARY KEY,
    company_id  INTEGER NOT NULL REFERENCES companies(company_id),
    name        TEXT NOT NULL,
    permissions TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS memberships (
    user_id     INTEGER NOT NULL REFERENCES users(user_id),
    company_id  INTEGER NOT NULL REFERENCES companies(company_id),
    role_id     INTEGER REFERENCES roles(role_id),
    position_id INTEGER REFERENCES positions(position_id),
    approval    TEXT NOT NULL DEFAULT 'pending'
                CHECK (approval IN ('pending', 'approved', 'rejected')),
    active      INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (user_id, company_id)
);

CREATE TABLE IF NOT EXISTS permissions (
    code       TEXT PRIMARY KEY,
    category   TEXT NOT NULL,
    scope      TEXT NOT NULL CHECK (scope IN ('global', 'company')),
    min_role   TEXT,
    visibility TEXT NOT NULL DEFAULT 'listed'
               CHECK (visibility IN ('public', 'listed', 'hidden'))
);

-- One row per (subject, scope, code); writes replace it in place.
CREATE TABLE IF NOT EXISTS permission_overlays (
    subject_user_id  INTEGER NOT NULL REFERENCES users(user_id),
    scope_company_id INTEGER NOT NULL DEFAULT 0,
    code             TEXT NOT NULL REFERENCES permissions(code),
    action           TEXT NOT NULL CHECK (action IN ('grant', 'revoke')),
    note             TEXT,
    granted_by       INTEGER NOT NULL REFERENCES users(user_id),
    expires_at       TEXT,
    updated_at       TEXT NOT NULL,
    PRIMARY KEY (subject_user_id, scope_company_id, code)
);

CREATE TABLE IF NOT EXISTS job_posts (
    job_post_id INTEGER PRIMARY KEY,
    company_id  INTEGER NOT NULL REFERENCES companies(company_id),
    created_by  INTEGER NOT NULL REFERENCES users(user_id),
    title       TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'published', 'paused', 'closed')),
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS applications (
    application_id INTEGER PRIMARY KEY,
    company_id     INTEGER NOT NULL REFERENCES companies(company_id),
    job_post_id    INTEGER NOT NULL REFERENCES job_posts(job_post_id),
    applicant_id   INTEGER NOT NULL REFERENCES users(user_id),
    status         TEXT NOT NULL DEFAULT 'submitted'
                   CHECK (status IN (
                     'submitted', 'under_review', 'shortlisted', 'interview',
                     'in_communication', 'pending_documents', 'offered',
                     'hired', 'rejected', 'withdrawn', 'offer_declined'
                   )),
    reviewer_id    INTEGER REFERENCES users(user_id),
    cover_note     TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    UNIQUE (job_post_id, applicant_id)
);

CREATE TABLE IF NOT EXISTS document_requests (
    document_request_id INTEGER PRIMARY KEY,
    application_id      INTEGER NOT NULL REFERENCES applications(application_id),
    company_id          INTEGER NOT NULL REFERENCES companies(company_id),
    applicant_id        INTEGER NOT NULL REFERENCES users(user_id),
    name                TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'requested'
                        CHECK (status IN (
                          'requested', 'submitted', 'approved', 'rejected',
                          'waived'
                        )),
    requested_by        INTEGER NOT NULL REFERENCES users(user_id),
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

-- Ledgers are strictly append-only; the triggers reject UPDATE and DELETE.
CREATE TABLE IF NOT EXISTS status_history (
    history_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_kind TEXT NOT NULL,
    entity_id   INTEGER NOT NULL,
    old_status  TEXT NOT NULL,
    new_status  TEXT NOT NULL,
    actor_id    INTEGER,
    note        TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log (
    audit_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_kind  TEXT NOT NULL,
    entity_id    INTEGER NOT NULL,
    action       TEXT NOT NULL,
    actor_id     INTEGER,
    before_value TEXT,
    after_value  TEXT,
    metadata     TEXT NOT NULL DEFAULT 'null',
    created_at   TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS status_history_no_update
BEFORE UPDATE ON status_history
BEGIN SELECT RAISE(ABORT, 'status_history is append-only'); END;

CREATE TRIGGER IF NOT EXISTS status_history_no_delete
BEFORE DELETE ON status_history
BEGIN SELECT RAISE(ABORT, 'status_history is append-only'); END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_update
BEFORE UPDATE ON audit_log
BEGIN SELECT RAISE(ABORT, 'audit_log is append-only'); END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
BEFORE DELETE ON audit_log
BEGIN SELECT RAISE(ABORT, 'audit_log is append-only'); END;

CREATE TABLE IF NOT EXISTS notifications (
    notification_id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_id    INTEGER NOT NULL REFERENCES users(user_id),
    kind            TEXT NOT NULL,
    entity_kind     TEXT NOT NULL,
    entity_id       INTEGER NOT NULL,
    dedupe_key      TEXT NOT NULL UNIQUE,
    payload         TEXT NOT NULL,
    is_read         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS memberships_company_idx  ON memberships(company_id);
CREATE INDEX IF NOT EXISTS overlays_subject_idx     ON permission_overlays(subject_user_id, scope_company_id);
CREATE INDEX IF NOT EXISTS applications_post_idx    ON applications(job_post_id);
CREATE INDEX IF NOT EXISTS documents_app_idx        ON document_requests(application_id);
CREATE INDEX IF NOT EXISTS history_entity_idx       ON status_history(entity_kind, entity_id);
CREATE INDEX IF NOT EXISTS audit_entity_idx         ON audit_log(entity_kind, entity_id);
CREATE INDEX IF NOT EXISTS notifications_recipient_idx ON notifications(recipient_id, is_read);
";

/// Version 2: per-post count of applications in an active status, backfilled
/// from the current rows.
const V2: &str = "
ALTER TABLE job_posts ADD COLUMN active_applications INTEGER NOT NULL DEFAULT 0;

UPDATE job_posts SET active_applications = (
    SELECT COUNT(*) FROM applications a
    WHERE a.job_post_id = job_posts.job_post_id
      AND a.status NOT IN ('hired', 'rejected', 'withdrawn', 'offer_declined')
);
";

const MIGRATIONS: &[(u32, &str)] = &[(1, V1), (2, V2)];

/// The newest schema version this crate knows how to create.
pub const LATEST: u32 = 2;

/// What the opened schema supports. Resolved once at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
  pub schema_version: u32,
  /// `job_posts.active_applications` exists and is maintained.
  pub active_counter: bool,
}

impl Capabilities {
  pub fn for_version(schema_version: u32) -> Self {
    Self { schema_version, active_counter: schema_version >= 2 }
  }
}

/// Bring the database up to `target`, one transaction per step. Returns the
/// resulting version, which may exceed `target` for a database written by a
/// newer build.
pub fn migrate(conn: &mut Connection, target: u32) -> rusqlite::Result<u32> {
  conn.execute_batch(PRAGMAS)?;
  let mut version: u32 =
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

  for &(step, sql) in MIGRATIONS {
    if step <= version || step > target {
      continue;
    }
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.pragma_update(None, "user_version", step)?;
    tx.commit()?;
    version = step;
  }
  Ok(version)
}
