//! Control plane: HTTP API, schedule planning and dispatch, the per-account
//! run executor, the credential vault, and login-session auto-capture.

pub mod api;
pub mod cluster;
pub mod fingerprint;
pub mod runtime;
pub mod state;
pub mod vault;
