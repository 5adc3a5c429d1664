use thiserror::Error;

/// Errors surfaced by the entity stores.
///
/// Remote failures deliberately never reach callers of `load`, `add`,
/// `update` or `delete` — the stores degrade to local state instead. What
/// callers can see is bad input (`Validation`), a missing id (`NotFound`),
/// and cache setup problems (`Cache`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("required field '{field}' is missing or empty")]
    Validation { field: &'static str },

    #[error("no entity with id '{id}'")]
    NotFound { id: String },

    #[error("cache unavailable: {0}")]
    Cache(#[from] std::io::Error),

    #[error("setup failed: {0}")]
    Setup(String),
}

/// Failure talking to the remote store. Transport errors and non-2xx
/// responses collapse into the single `Unavailable` class: the stores do
/// not distinguish them when deciding to fall back to the cache.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("no valid session token")]
    Unauthenticated,

    #[error("remote store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Unavailable {
            reason: err.to_string(),
        }
    }
}
