/// Worker-side errors surfaced across the session-manager API.
#[derive(thiserror::Error, Debug)]
pub enum NodeError {
    #[error("login session not found")]
    SessionNotFound,

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser: {0}")]
    Browser(String),
}
