//! Runtime configuration of the review engine, loaded from environment
//! variables with defaults.

/// Knobs of the three-stage engine. All fields have defaults via
/// [`ReviewConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Review shards per job; also the unit the broker capacity scales with.
    pub max_workers: usize,

    /// External review tool binary.
    pub devagent_bin: String,
    /// Checkout of the review tool; its HEAD is recorded with every job.
    pub devagent_root: String,

    /// Review tool config written into every project root as `.devagent.toml`.
    pub devagent_provider: String,
    pub devagent_model: String,
    pub devagent_api_key: String,

    /// Rules project location.
    pub rules_remote: String,
    pub rules_project: String,
    pub rules_revision: String,

    /// Overrides `https://<remote>` as the clone-URL base (local mirrors).
    pub clone_base: Option<String>,

    /// Shallow fetch of project revisions.
    pub shallow_fetch: bool,
}

impl ReviewConfig {
    pub fn from_env() -> Self {
        Self {
            max_workers: parse("MAX_WORKERS", 12usize),
            devagent_bin: env("DEVAGENT_BIN", "devagent"),
            devagent_root: env("DEVAGENT_ROOT", "/devagent"),
            devagent_provider: env("DEVAGENT_PROVIDER", ""),
            devagent_model: env("DEVAGENT_MODEL", ""),
            devagent_api_key: env("DEVAGENT_API_KEY", ""),
            rules_remote: env("DEVAGENT_RULES_REMOTE", "gitcode.com"),
            rules_project: env("DEVAGENT_RULES_PROJECT", "devagent/review-rules"),
            rules_revision: env("DEVAGENT_RULES_REVISION", "main"),
            clone_base: std::env::var("DEVAGENT_CLONE_BASE").ok(),
            shallow_fetch: env("DEVAGENT_SHALLOW_FETCH", "true") == "true",
        }
    }

    /// Clone URL for a project of a remote.
    pub fn clone_url(&self, remote: &str, project: &str) -> String {
        match &self.clone_base {
            Some(base) => format!("{base}/{project}"),
            None => format!("https://{remote}/{project}.git"),
        }
    }

    /// Canonical web URL of a rule, by its stem.
    pub fn rule_web_url(&self, stem: &str) -> String {
        format!(
            "https://{}/{}/tree/{}/REVIEW_RULES/{stem}.md",
            self.rules_remote, self.rules_project, self.rules_revision
        )
    }

    pub fn git_depth(&self) -> Option<i32> {
        self.shallow_fetch.then_some(1)
    }
}

fn env(k: &str, dflt: &str) -> String {
    std::env::var(k).unwrap_or_else(|_| dflt.to_string())
}

fn parse<T: std::str::FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(dflt)
}
