//! Guarded, concurrency-safe lifecycle transitions.
//!
//! A transition reads the current status, validates the edge against the
//! machine's table, authorizes the actor, and commits with a compare-and-swap.
//! Only after the swap lands does it append history, and only after history
//! lands does it fan out notifications. Failures in those last two steps are
//! logged and never undo the committed change.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
  Error, Result,
  clock::Clock,
  directory::codes,
  entity::{
    Application, CounterAdjustment, DocumentRequest, EntityHead, JobPost,
    NewApplication, NewDocumentRequest, StatusSwap, SwapOutcome,
  },
  gate::Gate,
  history::{HistoryRecorder, actions},
  ids::{EntityRef, UserId},
  notification::{Fanout, FanoutReport, NotificationKind},
  scope::Scope,
  status::{ApplicationStatus, StateMachine},
  store::RecruitStore,
};

/// The result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Transition<M> {
  /// Already in the requested status; nothing was written.
  Unchanged { status: M },
  Committed {
    from:       M,
    to:         M,
    /// `None` if the history append failed after the commit.
    history_id: Option<i64>,
  },
  /// A concurrent writer won the swap; `current` is the authoritative status.
  Superseded { attempted: M, current: M },
}

impl<M: StateMachine> Transition<M> {
  /// The entity's status after this call.
  pub fn status(&self) -> M {
    match *self {
      Self::Unchanged { status } => status,
      Self::Committed { to, .. } => to,
      Self::Superseded { current, .. } => current,
    }
  }

  pub fn is_committed(&self) -> bool { matches!(self, Self::Committed { .. }) }

  /// Treat losing a race as an error, for callers that cannot accept the
  /// winner's status.
  pub fn into_committed(self, entity: EntityRef) -> Result<Self> {
    match self {
      Self::Superseded { attempted, current } => Err(Error::ConcurrentModification {
        entity,
        expected: attempted.to_string(),
        actual: current.to_string(),
      }),
      other => Ok(other),
    }
  }
}

pub struct Lifecycle<'a, S> {
  store: &'a S,
  gate:  &'a Gate<'a, S>,
  clock: &'a dyn Clock,
}

impl<'a, S: RecruitStore> Lifecycle<'a, S> {
  pub fn new(store: &'a S, gate: &'a Gate<'a, S>, clock: &'a dyn Clock) -> Self {
    Self { store, gate, clock }
  }

  fn recorder(&self) -> HistoryRecorder<'a, S> {
    HistoryRecorder::new(self.store, self.clock)
  }

  fn fanout(&self) -> Fanout<'a, S> { Fanout::new(self.store, self.clock) }

  async fn head(&self, entity: EntityRef) -> Result<EntityHead> {
    self
      .store
      .entity_head(entity)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound(entity))
  }

  /// Move entity `id` of machine `M` to `to`.
  pub async fn transition<M: StateMachine>(
    &self,
    id: i64,
    actor: Option<UserId>,
    to: M,
    note: Option<String>,
  ) -> Result<Transition<M>> {
    let entity = EntityRef::new(M::ENTITY, id);
    let head = self.head(entity).await?;
    let from: M = parse_status(&head.status, entity)?;
    let scope = Scope::Company(head.company_id);

    if M::is_self_service(to) {
      // Owner-only edge. Repeating it is an error, not a no-op.
      if actor != Some(head.owner_id) {
        return Err(Error::denied(M::UPDATE_CODE, scope, actor));
      }
      if !from.is_active() || !from.can_transition(to) {
        return Err(invalid(from, to));
      }
    } else {
      if from == to {
        return Ok(Transition::Unchanged { status: from });
      }
      if !from.can_transition(to) {
        return Err(invalid(from, to));
      }
      self.gate.require(actor, M::UPDATE_CODE, scope).await?;
    }

    let counter = match head.job_post_id {
      Some(job_post_id) if M::COUNTS_ACTIVE && from.is_active() != to.is_active() => {
        Some(CounterAdjustment {
          job_post_id,
          delta: if to.is_active() { 1 } else { -1 },
        })
      }
      _ => None,
    };

    let outcome = self
      .store
      .compare_and_swap(StatusSwap {
        entity,
        expected: from.to_string(),
        next: to.to_string(),
        counter,
        at: self.clock.now(),
      })
      .await
      .map_err(Error::store)?;

    match outcome {
      SwapOutcome::Applied => {}
      SwapOutcome::Conflict { current } => {
        let current: M = parse_status(&current, entity)?;
        info!(%entity, attempted = %to, %current, "transition lost a race");
        return Ok(Transition::Superseded { attempted: to, current });
      }
      SwapOutcome::Missing => return Err(Error::NotFound(entity)),
    }
    info!(%entity, %from, %to, ?actor, "transition committed");

    let history = match self
      .recorder()
      .record_transition(entity, from.as_ref(), to.as_ref(), actor, note.clone())
      .await
    {
      Ok(row) => row,
      Err(e) => {
        warn!(error = %e, %entity, "failed to append status history");
        return Ok(Transition::Committed { from, to, history_id: None });
      }
    };

    if let Some(kind) = M::NOTIFY {
      let payload = json!({
        "entity": entity,
        "from": from.as_ref(),
        "to": to.as_ref(),
        "actor_id": actor,
        "history_id": history.history_id,
      });
      // Keyed by the history row: a retry reuses it, a later re-entry into
      // the same status does not.
      let disambiguator = history.history_id.to_string();
      if let Err(e) = self
        .notify_status_change(kind, &head, actor, &payload, &disambiguator)
        .await
      {
        warn!(error = %e, %entity, "failed to fan out status change");
      }
    }

    Ok(Transition::Committed {
      from,
      to,
      history_id: Some(history.history_id),
    })
  }

  async fn notify_status_change(
    &self,
    kind: NotificationKind,
    head: &EntityHead,
    actor: Option<UserId>,
    payload: &serde_json::Value,
    disambiguator: &str,
  ) -> Result<FanoutReport> {
    let fanout = self.fanout();
    let recipients = fanout.status_change_recipients(head, actor).await?;
    fanout
      .fanout(kind, head.entity, &recipients, payload, Some(disambiguator))
      .await
  }

  async fn notify_new_application(
    &self,
    application: &Application,
    job_post: &JobPost,
  ) -> Result<FanoutReport> {
    let fanout = self.fanout();
    let entity = EntityRef::application(application.application_id);
    let recipients = fanout
      .new_application_recipients(application, job_post)
      .await?;
    let payload = json!({
      "entity": entity,
      "job_post_id": application.job_post_id,
      "applicant_id": application.applicant_id,
    });
    fanout
      .fanout(NotificationKind::NewApplication, entity, &recipients, &payload, None)
      .await
  }

  /// Create an application in `submitted` for `job_post_id`.
  pub async fn submit(
    &self,
    actor: Option<UserId>,
    job_post_id: i64,
    cover_note: Option<String>,
  ) -> Result<Application> {
    let job_post = self
      .store
      .job_post(job_post_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound(EntityRef::job_post(job_post_id)))?;
    let Some(applicant_id) = actor else {
      return Err(Error::denied(codes::APPLICATION_SUBMIT, Scope::Global, None));
    };
    self.gate.require(actor, codes::APPLICATION_SUBMIT, Scope::Global).await?;

    if !job_post.status.accepts_applications() {
      return Err(Error::Validation(format!(
        "job post {job_post_id} is {} and not accepting applications",
        job_post.status
      )));
    }

    let application = self
      .store
      .insert_application(NewApplication {
        company_id: job_post.company_id,
        job_post_id,
        applicant_id,
        cover_note,
        created_at: self.clock.now(),
        count_active: ApplicationStatus::COUNTS_ACTIVE,
      })
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::Validation(format!(
          "user {applicant_id} already applied to job post {job_post_id}"
        ))
      })?;

    let entity = EntityRef::application(application.application_id);
    info!(%entity, job_post_id, applicant = %applicant_id, "application submitted");

    if let Err(e) = self
      .recorder()
      .record_audit(
        entity,
        actions::APPLICATION_SUBMITTED,
        actor,
        None,
        Some(application.status.to_string()),
        json!({ "job_post_id": job_post_id }),
      )
      .await
    {
      warn!(error = %e, %entity, "failed to audit submission");
      return Ok(application);
    }

    if let Err(e) = self.notify_new_application(&application, &job_post).await {
      warn!(error = %e, %entity, "failed to fan out new application");
    }

    Ok(application)
  }

  /// Set or clear the reviewer of an application.
  pub async fn assign_reviewer(
    &self,
    actor: Option<UserId>,
    application_id: i64,
    reviewer_id: Option<UserId>,
  ) -> Result<Application> {
    let entity = EntityRef::application(application_id);
    let application = self
      .store
      .application(application_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound(entity))?;
    let scope = Scope::Company(application.company_id);
    self.gate.require(actor, codes::APPLICATION_ASSIGN, scope).await?;

    if application.status.is_terminal() {
      return Err(Error::Validation(format!(
        "application {application_id} is {}",
        application.status
      )));
    }
    if let Some(reviewer) = reviewer_id {
      let member = self
        .store
        .membership(reviewer, application.company_id)
        .await
        .map_err(Error::store)?;
      if !member.is_some_and(|m| m.is_in_good_standing()) {
        return Err(Error::Validation(format!(
          "user {reviewer} is not an active member of company {}",
          application.company_id
        )));
      }
    }

    let updated = self
      .store
      .set_reviewer(application_id, reviewer_id, self.clock.now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound(entity))?;

    if let Err(e) = self
      .recorder()
      .record_audit(
        entity,
        actions::REVIEWER_ASSIGNED,
        actor,
        application.reviewer_id.map(|r| r.to_string()),
        reviewer_id.map(|r| r.to_string()),
        serde_json::Value::Null,
      )
      .await
    {
      warn!(error = %e, %entity, "failed to audit reviewer assignment");
    }

    Ok(updated)
  }

  /// Ask the applicant for a document.
  pub async fn request_document(
    &self,
    actor: Option<UserId>,
    application_id: i64,
    name: &str,
  ) -> Result<DocumentRequest> {
    let application_ref = EntityRef::application(application_id);
    let application = self
      .store
      .application(application_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound(application_ref))?;
    let scope = Scope::Company(application.company_id);
    self.gate.require(actor, codes::DOCUMENT_REVIEW, scope).await?;
    let Some(requested_by) = actor else {
      return Err(Error::denied(codes::DOCUMENT_REVIEW, scope, None));
    };

    let name = name.trim();
    if name.is_empty() {
      return Err(Error::Validation("document name is empty".into()));
    }
    if application.status.is_terminal() {
      return Err(Error::Validation(format!(
        "application {application_id} is {}",
        application.status
      )));
    }

    let document = self
      .store
      .insert_document_request(NewDocumentRequest {
        application_id,
        company_id: application.company_id,
        applicant_id: application.applicant_id,
        name: name.to_owned(),
        requested_by,
        created_at: self.clock.now(),
      })
      .await
      .map_err(Error::store)?;

    let entity = EntityRef::document_request(document.document_request_id);
    if let Err(e) = self
      .recorder()
      .record_audit(
        entity,
        actions::DOCUMENT_REQUESTED,
        actor,
        None,
        Some(document.status.to_string()),
        json!({ "application_id": application_id, "name": document.name }),
      )
      .await
    {
      warn!(error = %e, %entity, "failed to audit document request");
      return Ok(document);
    }

    let payload = json!({
      "entity": entity,
      "application_id": application_id,
      "name": document.name,
    });
    if let Err(e) = self
      .fanout()
      .fanout(
        NotificationKind::DocumentRequested,
        entity,
        &[application.applicant_id],
        &payload,
        None,
      )
      .await
    {
      warn!(error = %e, %entity, "failed to fan out document request");
    }

    Ok(document)
  }
}

fn invalid<M: StateMachine>(from: M, to: M) -> Error {
  Error::InvalidTransition {
    entity: M::ENTITY,
    from:   from.to_string(),
    to:     to.to_string(),
  }
}

fn parse_status<M: StateMachine>(raw: &str, entity: EntityRef) -> Result<M> {
  raw.parse::<M>().map_err(|_| {
    Error::Validation(format!("{entity} has unknown stored status {raw:?}"))
  })
}
