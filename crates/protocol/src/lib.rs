//! Wire contract between the control plane and the browser node.
//!
//! The browser node executes one action (or an ordered batch) per request
//! against a fresh browser context seeded with a storage state, and manages
//! long-lived interactive login sessions. Everything that crosses that HTTP
//! boundary is defined here, together with the platform adapter registry
//! both services consult.

mod action;
mod api;
pub mod codes;
mod fingerprint;
mod platforms;
mod storage_state;

pub use action::{
    ActionRequest, ActionStatus, BandwidthMode, ExecuteActionResult, SearchCandidate,
};
pub use api::{
    ExecuteActionRequest, ExecuteBatchRequest, ExecuteBatchResponse, IsLoggedInResponse,
    StartLoginSessionRequest, StartLoginSessionResponse, StopSessionResponse,
    INTERNAL_TOKEN_HEADER,
};
pub use fingerprint::{sanitize_fingerprint, FingerprintProfile, Viewport};
pub use platforms::{adapter_for, PlatformAdapter};
pub use storage_state::{StorageCookie, StorageState};
