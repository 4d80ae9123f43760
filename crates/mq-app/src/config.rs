use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8888";
pub const DEFAULT_CLIENT_ID: &str = "MaskQueue/1.0";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub client_id: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            data_dir: PathBuf::from("outputs"),
        }
    }
}

impl AppConfig {
    /// Reads `.env` (if present) and the `MQ_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let request_timeout = match lookup("MQ_REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("MQ_REQUEST_TIMEOUT_SECS must be a number, got {v:?}"))?,
            ),
            None => defaults.request_timeout,
        };

        let poll_interval = match lookup("MQ_POLL_INTERVAL_MS") {
            Some(v) => Duration::from_millis(
                v.parse()
                    .with_context(|| format!("MQ_POLL_INTERVAL_MS must be a number, got {v:?}"))?,
            ),
            None => defaults.poll_interval,
        };
        anyhow::ensure!(!poll_interval.is_zero(), "MQ_POLL_INTERVAL_MS must be positive");

        Ok(Self {
            api_url: lookup("MQ_API_URL").unwrap_or(defaults.api_url),
            client_id: lookup("MQ_CLIENT_ID").unwrap_or(defaults.client_id),
            request_timeout,
            poll_interval,
            data_dir: lookup("MQ_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn gallery_path(&self) -> PathBuf {
        self.data_dir.join("gallery.json")
    }
}
