use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Places provider. Optional: discovery jobs fail fast at start when
    // it is missing, rather than the process refusing to boot.
    pub google_places_api_key: Option<String>,

    // Queue
    pub worker_concurrency: usize,
    pub job_max_attempts: u32,
    pub job_backoff_base_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            google_places_api_key: env::var("GOOGLE_PLACES_API_KEY").ok().filter(|k| !k.is_empty()),
            worker_concurrency: parsed_env("WORKER_CONCURRENCY", 2),
            job_max_attempts: parsed_env("JOB_MAX_ATTEMPTS", 3),
            job_backoff_base_secs: parsed_env("JOB_BACKOFF_BASE_SECS", 2),
        }
    }

    /// Log the config with credentials redacted.
    pub fn log_redacted(&self) {
        info!(
            places_key_configured = self.google_places_api_key.is_some(),
            worker_concurrency = self.worker_concurrency,
            job_max_attempts = self.job_max_attempts,
            job_backoff_base_secs = self.job_backoff_base_secs,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got '{raw}'")),
        Err(_) => default,
    }
}
