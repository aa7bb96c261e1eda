use std::time::Duration;

/// Core error type for postwatch.
///
/// Adapter crates map their library errors into this type. Only notification and
/// state-save failures are expected to reach the binary; fetch failures are absorbed
/// by the fetch strategies.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited again after waiting {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("notification rejected: {0}")]
    Rejected(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
