//! Business rules of the hyperlocal platform: the reservation engine, the
//! listing filter, host authoring and account roles.
//!
//! Items from `entity_api` are re-exported so that consumers of `domain` never
//! depend on `entity_api` directly.

// Re-exports from `entity` crate via `entity_api`
pub use entity_api::{events, reservation_status, reservations, roles, users, Id};

pub mod catalog;
pub mod error;
pub mod event;
pub mod gateway;
pub mod listing;
pub mod reservation;
pub mod user;
