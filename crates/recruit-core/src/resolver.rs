//! The permission resolver.
//!
//! Resolution merges, for one (user, scope) pair:
//!
//! 1. the baseline: public codes, the user's global-role codes, and at a
//!    company scope the company-role codes and position defaults of an
//!    active, approved membership;
//! 2. the owner/admin fast path: the company's creator and members in good
//!    standing holding the company-scoped `admin` role get every
//!    company-scoped code;
//! 3. live overlays from the global layer and, at a company scope, the
//!    company layer. Grants add, revokes subtract, and a revoke wins over
//!    everything above, the fast path included.
//!
//! The resolver never fails. Missing leaf data contributes nothing, and a
//! backend error resolves to the empty set.
//!
//! Results are cached in a memo owned by the resolver, so the cache lives
//! exactly as long as the gate that holds it: one request.

use std::{
  collections::{BTreeSet, HashMap},
  sync::{Arc, Mutex},
};

use tracing::{debug, warn};

use crate::{
  clock::Clock,
  directory::{PermissionCode, RoleScope, Visibility},
  ids::{CompanyId, UserId},
  overlay::apply_overlays,
  scope::Scope,
  store::{Directory, OverlayStore},
};

/// Per-request cache of catalog and effective-set lookups.
#[derive(Debug, Default)]
struct Memo {
  catalog:   Option<Arc<[PermissionCode]>>,
  effective: HashMap<(Option<UserId>, Scope), Arc<BTreeSet<String>>>,
}

impl Memo {
  fn new() -> Self { Self::default() }

  /// Drop every cached set belonging to `user`.
  fn forget_user(&mut self, user: UserId) {
    self.effective.retain(|(u, _), _| *u != Some(user));
  }
}

pub struct Resolver<'a, S> {
  store: &'a S,
  clock: &'a dyn Clock,
  memo:  Mutex<Memo>,
}

impl<'a, S> Resolver<'a, S>
where
  S: Directory + OverlayStore,
{
  pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
    Self { store, clock, memo: Mutex::new(Memo::new()) }
  }

  /// Invalidate cached sets for `user` after their overlays changed.
  pub fn forget(&self, user: UserId) { self.lock().forget_user(user); }

  /// Whether `user` holds `code` at `scope`.
  pub async fn resolve(
    &self,
    user: Option<UserId>,
    code: &str,
    scope: Scope,
  ) -> bool {
    let allowed = self.effective_set(user, scope).await.contains(code);
    debug!(?user, code, %scope, allowed, "resolved permission");
    allowed
  }

  /// Every code `user` holds at `scope`.
  pub async fn effective_set(
    &self,
    user: Option<UserId>,
    scope: Scope,
  ) -> Arc<BTreeSet<String>> {
    let cached = self.lock().effective.get(&(user, scope)).cloned();
    if let Some(hit) = cached {
      return hit;
    }

    match self.compute(user, scope).await {
      Ok(set) => {
        let set = Arc::new(set);
        self.lock().effective.insert((user, scope), Arc::clone(&set));
        set
      }
      Err(e) => {
        warn!(error = %e, ?user, %scope, "permission lookup failed; denying");
        Arc::new(BTreeSet::new())
      }
    }
  }

  /// Whether `user`'s global role is the global `admin` role.
  pub async fn is_global_admin(&self, user: UserId) -> bool {
    self.global_admin(user).await.unwrap_or_else(|e| {
      warn!(error = %e, %user, "admin lookup failed; denying");
      false
    })
  }

  /// Whether `user` created `company_id`.
  pub async fn is_company_owner(&self, user: UserId, company_id: CompanyId) -> bool {
    match self.store.company(company_id).await {
      Ok(company) => company.is_some_and(|c| c.owner_id == user),
      Err(e) => {
        warn!(error = %e, %user, %company_id, "owner lookup failed; denying");
        false
      }
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Memo> {
    self.memo.lock().unwrap_or_else(|e| e.into_inner())
  }

  async fn catalog(&self) -> Result<Arc<[PermissionCode]>, S::Error> {
    let cached = self.lock().catalog.clone();
    if let Some(catalog) = cached {
      return Ok(catalog);
    }
    let catalog: Arc<[PermissionCode]> = self.store.permissions().await?.into();
    self.lock().catalog = Some(Arc::clone(&catalog));
    Ok(catalog)
  }

  async fn global_admin(&self, user: UserId) -> Result<bool, S::Error> {
    let Some(principal) = self.store.principal(user).await? else {
      return Ok(false);
    };
    let Some(role_id) = principal.global_role_id else {
      return Ok(false);
    };
    Ok(
      self
        .store
        .role(role_id)
        .await?
        .is_some_and(|r| r.scope == RoleScope::Global && r.is_admin()),
    )
  }

  async fn compute(
    &self,
    user: Option<UserId>,
    scope: Scope,
  ) -> Result<BTreeSet<String>, S::Error> {
    let catalog = self.catalog().await?;

    let mut baseline: BTreeSet<String> = catalog
      .iter()
      .filter(|p| p.visibility == Visibility::Public)
      .map(|p| p.code.clone())
      .collect();

    let Some(user) = user else {
      return Ok(baseline);
    };

    if let Some(principal) = self.store.principal(user).await?
      && let Some(role_id) = principal.global_role_id
      && let Some(role) = self.store.role(role_id).await?
    {
      baseline.extend(role.permissions);
    }

    if let Scope::Company(company_id) = scope {
      let mut company_admin = false;

      // A suspended, pending or rejected seat confers nothing.
      if let Some(membership) = self.store.membership(user, company_id).await?
        && membership.is_in_good_standing()
      {
        if let Some(role_id) = membership.role_id
          && let Some(role) = self.store.role(role_id).await?
        {
          company_admin = role.scope == RoleScope::Company && role.is_admin();
          baseline.extend(role.permissions);
        }

        if let Some(position_id) = membership.position_id
          && let Some(position) = self.store.position(position_id).await?
          && position.company_id == company_id
        {
          baseline.extend(position.permissions);
        }
      }

      let owner = self
        .store
        .company(company_id)
        .await?
        .is_some_and(|c| c.owner_id == user);

      if owner || company_admin {
        baseline.extend(
          catalog
            .iter()
            .filter(|p| p.scope == RoleScope::Company)
            .map(|p| p.code.clone()),
        );
      }
    }

    let mut layers = self.store.overlays_for(user, Scope::Global).await?;
    if !scope.is_global() {
      layers.extend(self.store.overlays_for(user, scope).await?);
    }

    Ok(apply_overlays(baseline, &layers, self.clock.now()))
  }
}
