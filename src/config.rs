use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// flow cache config
    pub cache: CacheConfig,
    /// session state config
    pub session: SessionConfig,
    /// node executor config
    pub executor: ExecutorConfig,
    /// navigation config
    pub navigation: NavigationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// compiled graph time-to-live in seconds, defaults to 300
    pub ttl_secs: u64,
    /// maximum number of tenants kept, defaults to 1024
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// inactivity timeout in seconds after which sessions are purged, defaults to 1800
    pub ttl_secs: u64,
    /// conversation history entries kept per session, defaults to 50
    pub history_limit: usize,
    /// maximum number of sessions kept by the in-memory store, defaults to 100000
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// internal hops allowed within one turn, defaults to 25
    pub max_hops: u32,
    /// tokens charged per hop in the deterministic estimate, defaults to 10
    pub hop_token_overhead: u64,
    /// extra attempts for retryable delegate failures, defaults to 2
    pub delegate_max_retries: u32,
    /// base backoff between delegate attempts in milliseconds, defaults to 200
    pub retry_backoff_ms: u64,
    /// reply used when a turn fails
    pub fallback_message: String,
    /// reply used when a condition node matches nothing
    pub no_match_message: String,
    /// reply used when the tenant has no active flow
    pub no_flow_message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// navigation steps kept per session, defaults to 50
    pub history_limit: usize,
    /// recent steps inspected for circular navigation, defaults to 10
    pub circular_window: usize,
    /// times a target may already appear in the window, defaults to 2
    pub circular_max_repeats: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            capacity: 1024,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 1800,
            history_limit: 50,
            capacity: 100_000,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_hops: 25,
            hop_token_overhead: 10,
            delegate_max_retries: 2,
            retry_backoff_ms: 200,
            fallback_message: "Sorry, something went wrong. Please try again later.".to_string(),
            no_match_message: "Sorry, I didn't understand that. Could you rephrase?".to_string(),
            no_flow_message: "No conversation flow is configured for this account.".to_string(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            circular_window: 10,
            circular_max_repeats: 2,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl ExecutorConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        Ok(config)
    }
}
