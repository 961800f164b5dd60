//! Domain-keyed diff providers.
//!
//! A [`DiffProviderRegistry`] resolves a pull-request URL to the client
//! registered for its domain and returns a normalised [`Diff`]. Transient
//! transport failures are retried with the shared bounded backoff; business
//! rejections and malformed URLs fail immediately.

pub mod errors;
pub mod models;
pub mod providers;

pub use errors::{ProviderError, ProviderResult};
pub use models::{Diff, DiffFile, DiffSummary};
pub use providers::ProviderClient;
pub use providers::diff_file::DiffFileClient;
pub use providers::gitcode::GitcodeClient;
pub use providers::gitee::GiteeClient;

use std::collections::HashMap;
use std::time::Duration;

use services::backoff::{DEFAULT_TRIES, DEFAULT_UNIT, retry_async};
use tracing::debug;

/// Domain → provider client.
pub struct DiffProviderRegistry {
    providers: HashMap<String, ProviderClient>,
    tries: u32,
    unit: Duration,
}

impl DiffProviderRegistry {
    pub fn new() -> Self {
        Self::with_backoff(DEFAULT_TRIES, DEFAULT_UNIT)
    }

    pub fn with_backoff(tries: u32, unit: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            tries,
            unit,
        }
    }

    pub fn register(&mut self, client: ProviderClient) {
        self.providers.insert(client.domain().to_string(), client);
    }

    /// True when the URL parses and its domain has a registered provider.
    /// Used by the listener for request validation before launching a job.
    pub fn is_known_url(&self, url: &str) -> bool {
        self.domain_of(url)
            .is_ok_and(|domain| self.providers.contains_key(&domain))
    }

    /// Fetches the normalised diff for one pull-request URL.
    pub async fn get_diff(&self, url: &str) -> ProviderResult<Diff> {
        let domain = self.domain_of(url)?;
        let client = self
            .providers
            .get(&domain)
            .ok_or(ProviderError::UnknownDomain(domain))?;

        debug!("fetching diff for {url}");
        retry_async(
            "get diff",
            self.tries,
            self.unit,
            ProviderError::is_transient,
            || client.get_diff(url),
        )
        .await
    }

    /// Fetches all URLs in order.
    pub async fn get_diffs(&self, urls: &[String]) -> ProviderResult<Vec<Diff>> {
        let mut diffs = Vec::with_capacity(urls.len());
        for url in urls {
            diffs.push(self.get_diff(url).await?);
        }
        Ok(diffs)
    }

    fn domain_of(&self, url: &str) -> ProviderResult<String> {
        // Absolute paths resolve to the local patch-file provider.
        if url.starts_with('/') {
            return Ok(String::new());
        }
        let parsed =
            url::Url::parse(url).map_err(|_| ProviderError::InvalidUrl(url.to_string()))?;
        parsed
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::InvalidUrl(url.to_string()))
    }
}

impl Default for DiffProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
