//! Persistence layer: the relational data model and a `Store` exposing one
//! method per state transition.
//!
//! Writes are short transactions committed at every state-transition
//! boundary so crash recovery always sees consistent, if not advanced,
//! state. The `(workspace_id, idempotency_key)` unique index on `actions`
//! is the global ordering point for concurrent re-entries.

pub mod models;
pub mod store;

pub use store::Store;
