//! Listener configuration, loaded from environment variables with defaults.

use review_pipeline::ReviewConfig;

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub listen_addr: String,

    /// HMAC request signing; off unless a secret is configured.
    pub auth_enabled: bool,
    pub secret_key: String,

    pub database_url: String,

    pub gitcode_api_base: String,
    pub gitcode_token: String,
    pub gitee_api_base: String,
    pub gitee_token: String,

    /// Retention of broker task state past completion, seconds.
    pub result_expiry_secs: u64,
    /// TaskInfo lifetime, seconds.
    pub task_info_expiry_secs: u64,
    /// Payload → job binding lifetime used for re-run dedup, seconds.
    pub payload_expiry_secs: u64,

    pub review: ReviewConfig,
}

impl ListenerConfig {
    pub fn from_env() -> Self {
        let secret_key = env("SECRET_KEY", "");
        Self {
            listen_addr: env("LISTEN_ADDR", "0.0.0.0:8000"),
            auth_enabled: env("AUTH_ENABLED", if secret_key.is_empty() { "false" } else { "true" })
                == "true",
            secret_key,
            database_url: env("DATABASE_URL", "sqlite::memory:"),
            gitcode_api_base: env("GITCODE_API_BASE", "https://api.gitcode.com/api/v5"),
            gitcode_token: env("GITCODE_TOKEN", ""),
            gitee_api_base: env("GITEE_API_BASE", "https://gitee.com/api/v5"),
            gitee_token: env("GITEE_TOKEN", ""),
            result_expiry_secs: parse("EXPIRY_DEVAGENT_WORKER", 2 * 60 * 60),
            task_info_expiry_secs: parse("EXPIRY_TASK_INFO", 12 * 60 * 60),
            payload_expiry_secs: parse("EXPIRY_PAYLOAD_BINDING", 60 * 60),
            review: ReviewConfig::from_env(),
        }
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
