//! Provider error taxonomy.
//!
//! `Transport` is the only retryable kind; `InvalidUrl` and `RemoteReject`
//! are final the moment they are observed.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The URL does not match the provider's pull-request shape.
    #[error("invalid pull request url: {0}")]
    InvalidUrl(String),

    /// No provider is registered for the URL's domain.
    #[error("no provider is registered for domain {0}")]
    UnknownDomain(String),

    /// Network-level failure (timeout, connect, 5xx); retried with backoff.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-zero business code.
    #[error("remote rejected the request with code {0}")]
    RemoteReject(i64),

    /// The remote answered 2xx but the payload has an unexpected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}
