//! Core types, store traits and the authorization/lifecycle engine for the
//! Recruit platform.
//!
//! No HTTP and no SQL live here. A state change passes through
//! [`gate::Gate`] first, is committed by [`lifecycle::Lifecycle`] with a
//! compare-and-swap, then lands in [`history::HistoryRecorder`] before
//! [`notification::Fanout`] enqueues deduplicated notices.

pub mod clock;
pub mod directory;
pub mod entity;
pub mod error;
pub mod gate;
pub mod history;
pub mod ids;
pub mod lifecycle;
pub mod notification;
pub mod overlay;
pub mod resolver;
pub mod scope;
pub mod status;
pub mod store;

pub use error::{Error, Result};
pub use ids::{CompanyId, EntityKind, EntityRef, PositionId, RoleId, UserId};
pub use scope::Scope;
