//! LeadRelay Core - in-memory state and outbound clients for the demo relay.
//!
//! This crate holds everything that does not depend on the HTTP framework:
//! the per-lead event store and relay, the webhook request log, the rate
//! limiter, contact submission validation and the clients that talk to the
//! e-mail API and the workflow webhook.

pub mod contact;
pub mod errors;
pub mod events;
pub mod outbound;
pub mod rate_limit;
pub mod steps;
pub mod webhook_log;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
