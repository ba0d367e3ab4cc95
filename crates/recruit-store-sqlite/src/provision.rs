//! Writes for leaf data and job posts.
//!
//! The engine only reads principals, roles, companies, memberships, positions
//! and the permission catalog. These methods exist so an operator (or a test)
//! can load them. Every write is an upsert keyed on the record's id.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use recruit_core::{
  directory::{Company, Membership, PermissionCode, Position, Principal, Role},
  entity::{JobPost, NewJobPost},
  ids::{CompanyId, UserId},
  status::JobPostStatus,
};

use crate::{
  Result, SqliteStore,
  encode::{RawJobPost, encode_codes, encode_dt},
};

/// A principal with optional login material.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
  #[serde(flatten)]
  pub principal:     Principal,
  pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedJobPost {
  pub company_id: CompanyId,
  pub created_by: UserId,
  pub title:      String,
  #[serde(default = "default_job_post_status")]
  pub status:     JobPostStatus,
}

fn default_job_post_status() -> JobPostStatus { JobPostStatus::Draft }

/// A bulk load of leaf data, applied in dependency order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
  pub permissions: Vec<PermissionCode>,
  pub roles:       Vec<Role>,
  pub users:       Vec<SeedUser>,
  pub companies:   Vec<Company>,
  pub positions:   Vec<Position>,
  pub memberships: Vec<Membership>,
  pub job_posts:   Vec<SeedJobPost>,
}

impl SqliteStore {
  pub async fn put_permission(&self, permission: PermissionCode) -> Result<()> {
    let scope = permission.scope.to_string();
    let visibility = permission.visibility.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO permissions (code, category, scope, min_role, visibility)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (code) DO UPDATE SET
             category   = excluded.category,
             scope      = excluded.scope,
             min_role   = excluded.min_role,
             visibility = excluded.visibility",
          rusqlite::params![
            permission.code,
            permission.category,
            scope,
            permission.min_role,
            visibility,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_role(&self, role: Role) -> Result<()> {
    let scope = role.scope.to_string();
    let permissions = encode_codes(&role.permissions)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO roles (role_id, scope, name, permissions)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (role_id) DO UPDATE SET
             scope       = excluded.scope,
             name        = excluded.name,
             permissions = excluded.permissions",
          rusqlite::params![role.role_id.0, scope, role.name, permissions],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or update a principal. A `None` hash keeps any stored one.
  pub async fn put_user(
    &self,
    principal: Principal,
    password_hash: Option<String>,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, username, password_hash, global_role_id)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id) DO UPDATE SET
             username       = excluded.username,
             password_hash  = COALESCE(excluded.password_hash, users.password_hash),
             global_role_id = excluded.global_role_id",
          rusqlite::params![
            principal.user_id.0,
            principal.username,
            password_hash,
            principal.global_role_id.map(|r| r.0),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_company(&self, company: Company) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO companies (company_id, name, owner_id)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (company_id) DO UPDATE SET
             name     = excluded.name,
             owner_id = excluded.owner_id",
          rusqlite::params![company.company_id.0, company.name, company.owner_id.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_position(&self, position: Position) -> Result<()> {
    let permissions = encode_codes(&position.permissions)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO positions (position_id, company_id, name, permissions)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (position_id) DO UPDATE SET
             company_id  = excluded.company_id,
             name        = excluded.name,
             permissions = excluded.permissions",
          rusqlite::params![
            position.position_id.0,
            position.company_id.0,
            position.name,
            permissions,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Replace the single (user, company) membership.
  pub async fn put_membership(&self, membership: Membership) -> Result<()> {
    let approval = membership.approval.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO memberships (
             user_id, company_id, role_id, position_id, approval, active
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (user_id, company_id) DO UPDATE SET
             role_id     = excluded.role_id,
             position_id = excluded.position_id,
             approval    = excluded.approval,
             active      = excluded.active",
          rusqlite::params![
            membership.user_id.0,
            membership.company_id.0,
            membership.role_id.map(|r| r.0),
            membership.position_id.map(|p| p.0),
            approval,
            membership.active,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_job_post(&self, input: NewJobPost) -> Result<JobPost> {
    let status = input.status.to_string();
    let created_at = encode_dt(Utc::now());
    let sql = format!(
      "SELECT {} FROM job_posts WHERE job_post_id = ?1",
      if self.capabilities().active_counter {
        RawJobPost::COLUMNS
      } else {
        RawJobPost::COLUMNS_V1
      }
    );
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO job_posts (company_id, created_by, title, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            input.company_id.0,
            input.created_by.0,
            input.title,
            status,
            created_at,
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(&sql, rusqlite::params![id], RawJobPost::from_row)?)
      })
      .await?;
    raw.into_job_post()
  }

  /// Load a [`Seed`], parents before children.
  pub async fn apply_seed(&self, seed: Seed) -> Result<()> {
    let Seed {
      permissions,
      roles,
      users,
      companies,
      positions,
      memberships,
      job_posts,
    } = seed;

    for p in permissions {
      self.put_permission(p).await?;
    }
    for r in roles {
      self.put_role(r).await?;
    }
    for u in users {
      self.put_user(u.principal, u.password_hash).await?;
    }
    for c in companies {
      self.put_company(c).await?;
    }
    for p in positions {
      self.put_position(p).await?;
    }
    for m in memberships {
      self.put_membership(m).await?;
    }
    let posts = job_posts.len();
    for jp in job_posts {
      self
        .insert_job_post(NewJobPost {
          company_id: jp.company_id,
          created_by: jp.created_by,
          title:      jp.title,
          status:     jp.status,
        })
        .await?;
    }
    info!(posts, "seed applied");
    Ok(())
  }
}
