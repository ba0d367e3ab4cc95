//! Status enums and their fixed transition tables.
//!
//! Each lifecycle entity is driven by a [`StateMachine`]: an enum whose
//! `successors` table is the only source of legal edges. A status with no
//! successors is terminal.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  directory::codes, ids::EntityKind, notification::NotificationKind,
};

pub trait StateMachine:
  Copy
  + Eq
  + fmt::Debug
  + fmt::Display
  + FromStr
  + AsRef<str>
  + Send
  + Sync
  + 'static
{
  const ENTITY: EntityKind;

  /// Permission required for every edge that is not self-service.
  const UPDATE_CODE: &'static str;

  /// Notification emitted on a committed transition, if any.
  const NOTIFY: Option<NotificationKind> = None;

  /// Whether the owning job post keeps a count of active entities.
  const COUNTS_ACTIVE: bool = false;

  fn successors(self) -> &'static [Self];

  fn can_transition(self, to: Self) -> bool { self.successors().contains(&to) }

  fn is_terminal(self) -> bool { self.successors().is_empty() }

  fn is_active(self) -> bool { !self.is_terminal() }

  /// Targets only the entity's owner may move to, without a permission check.
  fn is_self_service(to: Self) -> bool {
    let _ = to;
    false
  }
}

// ─── Application ─────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApplicationStatus {
  Submitted,
  UnderReview,
  Shortlisted,
  Interview,
  InCommunication,
  PendingDocuments,
  Offered,
  Hired,
  Rejected,
  Withdrawn,
  OfferDeclined,
}

impl StateMachine for ApplicationStatus {
  const COUNTS_ACTIVE: bool = true;
  const ENTITY: EntityKind = EntityKind::Application;
  const NOTIFY: Option<NotificationKind> =
    Some(NotificationKind::ApplicationStatusChanged);
  const UPDATE_CODE: &'static str = codes::APPLICATION_STATUS_UPDATE;

  fn successors(self) -> &'static [Self] {
    use ApplicationStatus::*;
    match self {
      Submitted => &[UnderReview, Rejected, Withdrawn],
      UnderReview => &[
        Shortlisted,
        Interview,
        InCommunication,
        PendingDocuments,
        Offered,
        Rejected,
        Withdrawn,
      ],
      // The lateral review stages move freely among themselves and converge
      // on an offer.
      Shortlisted => &[
        Interview,
        InCommunication,
        PendingDocuments,
        Offered,
        Rejected,
        Withdrawn,
      ],
      Interview => &[
        Shortlisted,
        InCommunication,
        PendingDocuments,
        Offered,
        Rejected,
        Withdrawn,
      ],
      InCommunication => &[
        Shortlisted,
        Interview,
        PendingDocuments,
        Offered,
        Rejected,
        Withdrawn,
      ],
      PendingDocuments => &[
        Shortlisted,
        Interview,
        InCommunication,
        Offered,
        Rejected,
        Withdrawn,
      ],
      Offered => &[Hired, Rejected, Withdrawn, OfferDeclined],
      Hired | Rejected | Withdrawn | OfferDeclined => &[],
    }
  }

  fn is_self_service(to: Self) -> bool { to == Self::Withdrawn }
}

// ─── Job post ────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobPostStatus {
  Draft,
  Published,
  Paused,
  Closed,
}

impl StateMachine for JobPostStatus {
  const ENTITY: EntityKind = EntityKind::JobPost;
  const UPDATE_CODE: &'static str = codes::JOB_POST_MANAGE;

  fn successors(self) -> &'static [Self] {
    use JobPostStatus::*;
    match self {
      Draft => &[Published, Closed],
      Published => &[Paused, Closed],
      Paused => &[Published, Closed],
      Closed => &[],
    }
  }
}

impl JobPostStatus {
  pub fn accepts_applications(self) -> bool { self == Self::Published }
}

// ─── Document request ────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
  Requested,
  Submitted,
  Approved,
  Rejected,
  Waived,
}

impl StateMachine for DocumentStatus {
  const ENTITY: EntityKind = EntityKind::DocumentRequest;
  const NOTIFY: Option<NotificationKind> =
    Some(NotificationKind::DocumentStatusChanged);
  const UPDATE_CODE: &'static str = codes::DOCUMENT_REVIEW;

  fn successors(self) -> &'static [Self] {
    use DocumentStatus::*;
    match self {
      Requested => &[Submitted, Waived],
      Submitted => &[Approved, Rejected],
      Rejected => &[Submitted],
      Approved | Waived => &[],
    }
  }

  fn is_self_service(to: Self) -> bool { to == Self::Submitted }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn application_terminals_have_no_exits() {
    let terminals: Vec<_> =
      ApplicationStatus::iter().filter(|s| s.is_terminal()).collect();
    assert_eq!(terminals, vec![
      ApplicationStatus::Hired,
      ApplicationStatus::Rejected,
      ApplicationStatus::Withdrawn,
      ApplicationStatus::OfferDeclined,
    ]);
  }

  #[test]
  fn submitted_cannot_jump_to_hired() {
    assert!(!ApplicationStatus::Submitted.can_transition(ApplicationStatus::Hired));
    assert!(ApplicationStatus::Offered.can_transition(ApplicationStatus::Hired));
  }

  #[test]
  fn no_status_lists_itself_as_successor() {
    for s in ApplicationStatus::iter() {
      assert!(!s.can_transition(s), "{s} loops");
    }
    for s in JobPostStatus::iter() {
      assert!(!s.can_transition(s), "{s} loops");
    }
    for s in DocumentStatus::iter() {
      assert!(!s.can_transition(s), "{s} loops");
    }
  }

  #[test]
  fn every_active_application_status_can_be_withdrawn() {
    for s in ApplicationStatus::iter().filter(|s| s.is_active()) {
      assert!(s.can_transition(ApplicationStatus::Withdrawn), "{s}");
    }
  }

  #[test]
  fn lateral_stages_converge_on_offer() {
    use ApplicationStatus::*;
    for s in [Shortlisted, Interview, InCommunication, PendingDocuments] {
      assert!(s.can_transition(Offered), "{s}");
      assert!(!s.can_transition(Hired), "{s}");
    }
  }

  #[test]
  fn statuses_use_snake_case_names() {
    assert_eq!(ApplicationStatus::UnderReview.as_ref(), "under_review");
    assert_eq!(
      "offer_declined".parse::<ApplicationStatus>().ok(),
      Some(ApplicationStatus::OfferDeclined)
    );
    assert_eq!(
      serde_json::to_string(&ApplicationStatus::PendingDocuments).ok(),
      Some("\"pending_documents\"".to_string())
    );
  }

  #[test]
  fn self_service_targets() {
    assert!(ApplicationStatus::is_self_service(ApplicationStatus::Withdrawn));
    assert!(!ApplicationStatus::is_self_service(ApplicationStatus::Rejected));
    assert!(DocumentStatus::is_self_service(DocumentStatus::Submitted));
    assert!(!JobPostStatus::is_self_service(JobPostStatus::Closed));
  }
}
