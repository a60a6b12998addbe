//! Typed parameters for endpoint inputs.
//!
//! Query strings and request bodies are deserialized into these types, so a
//! malformed input is rejected before any handler logic runs.

pub(crate) mod event;
pub(crate) mod user;
