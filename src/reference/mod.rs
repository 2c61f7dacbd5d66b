//! Reference regulatory tool server.
//!
//! Speaks the same line-delimited JSON-RPC protocol as the real regulatory
//! data service, backed by the small rule table in [`rules`]. Used for local
//! runs and integration tests.

pub mod rules;
pub mod server;

pub use server::{handle_request, serve};
