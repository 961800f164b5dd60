//! Provider clients, enum-dispatched — no async-trait, no boxed futures.

pub mod diff_file;
pub mod gitcode;
pub mod gitee;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::Diff;

/// Concrete provider client (enum-dispatch).
#[derive(Debug, Clone)]
pub enum ProviderClient {
    Gitcode(gitcode::GitcodeClient),
    Gitee(gitee::GiteeClient),
    /// Local patch files; registered under the empty domain.
    DiffFile(diff_file::DiffFileClient),
}

impl ProviderClient {
    /// Domain this client serves, the registry key.
    pub fn domain(&self) -> &str {
        match self {
            Self::Gitcode(c) => c.domain(),
            Self::Gitee(c) => c.domain(),
            Self::DiffFile(c) => c.domain(),
        }
    }

    /// Fetches and normalises the diff of one pull-request URL.
    pub async fn get_diff(&self, url: &str) -> ProviderResult<Diff> {
        match self {
            Self::Gitcode(c) => c.get_diff(url).await,
            Self::Gitee(c) => c.get_diff(url).await,
            Self::DiffFile(c) => c.get_diff(url).await,
        }
    }
}

/// Splits a pull-request URL path into `(owner, repo, number)`.
pub(crate) fn parse_pull_url(url: &str) -> ProviderResult<(String, String, String)> {
    let parsed = url::Url::parse(url).map_err(|_| ProviderError::InvalidUrl(url.to_string()))?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [owner, repo, pull, number, ..]
            if !owner.is_empty() && !repo.is_empty() && *pull == "pull" && !number.is_empty() =>
        {
            Ok((owner.to_string(), repo.to_string(), number.to_string()))
        }
        _ => Err(ProviderError::InvalidUrl(url.to_string())),
    }
}
