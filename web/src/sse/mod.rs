//! SSE HTTP handler for the web layer.
//!
//! The connection registry and message types live in the `sse` crate; this
//! module only turns a request into a registered, long-lived stream.

pub(crate) mod handler;
