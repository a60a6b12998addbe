//! Server-Sent Events (SSE) infrastructure for live catalog updates.
//!
//! Every signed-in browser keeps one `/sse` connection open while it shows a
//! listing or an event page. When the catalog changes (an event is created or
//! deleted, or a reservation takes a ticket) a typed [`message::Event`] is
//! broadcast to every connection and the client re-requests what it shows.
//! Messages are ephemeral: an offline client simply loads fresh data later.
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry with a per-connection index and a per-user index
//! - `manager`: message routing on top of the registry
//! - `message`: event and scope definitions
//! - `domain_event_handler`: turns `events::DomainEvent`s into broadcasts

pub mod connection;
pub mod domain_event_handler;
pub mod manager;
pub mod message;

pub use domain_event_handler::SseDomainEventHandler;
pub use manager::Manager;
