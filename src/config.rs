//! Runtime configuration, read from the environment.

use std::env;
use std::time::Duration;

/// Bundled defaults, used when no `.env` file is present.
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the workflow backend, without a trailing slash
    pub backend_url: String,
    /// Period between two workflow state fetches
    pub poll_interval: Duration,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Loads `.env` (or the bundled defaults) and then reads the environment.
    pub fn load() -> Self {
        load_dotenv();
        Self::from_env()
    }

    /// Reads the `MOTIVATY_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let backend_url = lookup("MOTIVATY_BACKEND_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let poll_interval = lookup("MOTIVATY_POLL_INTERVAL_MS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let log_filter =
            lookup("MOTIVATY_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            backend_url,
            poll_interval,
            log_filter,
        }
    }
}

fn load_dotenv() {
    // A local .env file wins over the bundled defaults
    if dotenvy::dotenv().is_ok() {
        return;
    }
    load_bundled_config();
}

fn load_bundled_config() {
    for (key, value) in parse_env_lines(BUNDLED_CONFIG) {
        // Only set if not already set (allow env override)
        if env::var(key).is_err() {
            // SAFETY: called once at startup, before the runtime spawns threads
            unsafe {
                env::set_var(key, value);
            }
        }
    }
}

fn parse_env_lines(source: &str) -> impl Iterator<Item = (&str, &str)> {
    source.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        line.split_once('=')
            .map(|(key, value)| (key.trim(), value.trim()))
    })
}
