//! The authorization gate: the one place mutating operations ask "may this
//! actor do this here?".

use crate::{
  Error, Result,
  clock::Clock,
  directory::codes,
  ids::UserId,
  resolver::Resolver,
  scope::Scope,
  store::{Directory, OverlayStore},
};

pub struct Gate<'a, S> {
  resolver: Resolver<'a, S>,
}

impl<'a, S> Gate<'a, S>
where
  S: Directory + OverlayStore,
{
  pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
    Self { resolver: Resolver::new(store, clock) }
  }

  pub fn resolver(&self) -> &Resolver<'a, S> { &self.resolver }

  /// Fail with [`Error::AuthorizationDenied`] unless `user` holds `code` at
  /// `scope`.
  pub async fn require(
    &self,
    user: Option<UserId>,
    code: &str,
    scope: Scope,
  ) -> Result<()> {
    if self.resolver.resolve(user, code, scope).await {
      Ok(())
    } else {
      Err(Error::denied(code, scope, user))
    }
  }

  /// Same decision as [`Gate::require`], as a boolean.
  pub async fn allows(&self, user: Option<UserId>, code: &str, scope: Scope) -> bool {
    self.resolver.resolve(user, code, scope).await
  }

  /// Authorize an overlay write at `scope`: the company owner, a global admin,
  /// or a holder of `permissions.manage` there. Returns the actor.
  pub async fn require_manage(
    &self,
    actor: Option<UserId>,
    scope: Scope,
  ) -> Result<UserId> {
    let Some(actor_id) = actor else {
      return Err(Error::denied(codes::PERMISSIONS_MANAGE, scope, None));
    };
    if self.resolver.is_global_admin(actor_id).await {
      return Ok(actor_id);
    }
    if let Scope::Company(company_id) = scope
      && self.resolver.is_company_owner(actor_id, company_id).await
    {
      return Ok(actor_id);
    }
    self.require(actor, codes::PERMISSIONS_MANAGE, scope).await?;
    Ok(actor_id)
  }
}
