//! Error-code vocabulary.
//!
//! Codes travel as plain strings so that a row always records exactly what
//! the worker reported, even across version skew. The constants below are
//! the authoritative set both services emit.

// ── Input validation ────────────────────────────────────────────────
pub const UNSUPPORTED_PLATFORM: &str = "UNSUPPORTED_PLATFORM";
pub const UNSUPPORTED_ACTION: &str = "UNSUPPORTED_ACTION";
pub const INVALID_TARGET: &str = "INVALID_TARGET";
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";

// ── Authentication & credentials ────────────────────────────────────
pub const AUTH_REQUIRED: &str = "AUTH_REQUIRED";
pub const CREDENTIAL_DECRYPT_FAILED: &str = "CREDENTIAL_DECRYPT_FAILED";

// ── UI contract drift ───────────────────────────────────────────────
pub const UI_SELECTOR_CHANGED: &str = "UI_SELECTOR_CHANGED";
pub const UI_INTERCEPTED: &str = "UI_INTERCEPTED";
pub const POST_VALIDATION_FAILED: &str = "POST_VALIDATION_FAILED";

// ── Policy skips (paired with status `skipped`) ─────────────────────
pub const REPLY_RESTRICTED: &str = "REPLY_RESTRICTED";

// ── Transport & runtime ─────────────────────────────────────────────
pub const NETWORK_TIMEOUT: &str = "NETWORK_TIMEOUT";
pub const BROWSER_ERROR: &str = "BROWSER_ERROR";
pub const BROWSER_NODE_ERROR: &str = "BROWSER_NODE_ERROR";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

// ── Cascade ─────────────────────────────────────────────────────────
pub const ABORTED: &str = "ABORTED";

// ── Control-plane gates ─────────────────────────────────────────────
pub const STRATEGY_NOT_FOUND: &str = "STRATEGY_NOT_FOUND";
pub const ACCOUNT_NOT_FOUND: &str = "ACCOUNT_NOT_FOUND";
pub const ACTION_FAILED: &str = "ACTION_FAILED";
pub const SUBSCRIPTION_INACTIVE: &str = "SUBSCRIPTION_INACTIVE";
pub const RUNTIME_QUOTA_EXCEEDED: &str = "RUNTIME_QUOTA_EXCEEDED";
