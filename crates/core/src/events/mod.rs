//! Lead events module.
//!
//! Status updates reported by the workflow engine are persisted in the
//! [`EventStore`] and fanned out through the [`EventRelay`] to open browser
//! streams. The store is the source of truth; the relay is best-effort.

mod model;
mod relay;
mod store;

pub use model::*;
pub use relay::*;
pub use store::*;
