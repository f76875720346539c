//! Environment-driven configuration.
//!
//! DESIGN
//! ======
//! Every knob has a compiled-in default and an environment override. Invalid
//! overrides fall back to the default instead of failing startup; only the
//! store selection is mandatory, because without it there is nowhere to load
//! from or save to.

use std::time::Duration;

use crate::consts::{
    DEFAULT_BRUSH_WIDTH, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_HISTORY_CAPACITY, DEFAULT_INIT_RETRIES,
    DEFAULT_INIT_RETRY_BASE_MS,
};
use crate::error::ErrorCode;

const DEFAULT_STORE_TABLE: &str = "profiles";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no canvas store configured; set DATABASE_URL or STORE_URL and STORE_KEY")]
    MissingStore,
    #[error("STORE_URL is set but STORE_KEY is missing")]
    MissingStoreKey,
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingStore => "E_CONFIG_MISSING_STORE",
            Self::MissingStoreKey => "E_CONFIG_MISSING_STORE_KEY",
        }
    }
}

/// Parse an environment variable, falling back to `default` when it is unset
/// or does not parse.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_string(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

// =============================================================================
// RETRY POLICY
// =============================================================================

/// Bounded exponential backoff for backend creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1_u32 << shift);
        delay.min(self.max_delay)
    }

    /// Attempts actually made; at least one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_INIT_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_INIT_RETRY_BASE_MS),
            max_delay: Duration::from_millis(crate::consts::MAX_INIT_RETRY_DELAY_MS),
        }
    }
}

// =============================================================================
// EDITOR CONFIG
// =============================================================================

/// Tuning knobs for an editor instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorConfig {
    /// Snapshots retained by the history log.
    pub history_capacity: usize,
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Free-hand brush width.
    pub brush_width: f64,
    /// Backend creation retry policy.
    pub retry: RetryPolicy,
}

impl EditorConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            history_capacity: env_parse("CANVAS_HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY).max(1),
            canvas_width: env_parse("CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH),
            canvas_height: env_parse("CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT),
            brush_width: env_parse("CANVAS_BRUSH_WIDTH", DEFAULT_BRUSH_WIDTH),
            retry: RetryPolicy {
                attempts: env_parse("CANVAS_INIT_RETRIES", DEFAULT_INIT_RETRIES),
                base_delay: Duration::from_millis(env_parse("CANVAS_INIT_RETRY_BASE_MS", DEFAULT_INIT_RETRY_BASE_MS)),
                max_delay: defaults.max_delay,
            },
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            brush_width: DEFAULT_BRUSH_WIDTH,
            retry: RetryPolicy::default(),
        }
    }
}

// =============================================================================
// STORE CONFIG
// =============================================================================

/// Which remote store backs the persistence gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Direct Postgres access.
    Postgres { database_url: String },
    /// The hosted backend's REST layer.
    Rest { base_url: String, api_key: String, access_token: Option<String>, table: String },
}

impl StoreConfig {
    /// Select a store from the environment. `DATABASE_URL` wins over the REST
    /// settings when both are present.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is configured or the REST settings are
    /// incomplete.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(database_url) = env_string("DATABASE_URL") {
            return Ok(Self::Postgres { database_url });
        }
        let Some(base_url) = env_string("STORE_URL") else {
            return Err(ConfigError::MissingStore);
        };
        let api_key = env_string("STORE_KEY").ok_or(ConfigError::MissingStoreKey)?;
        Ok(Self::Rest {
            base_url,
            api_key,
            access_token: env_string("STORE_ACCESS_TOKEN"),
            table: env_string("STORE_TABLE").unwrap_or_else(|| DEFAULT_STORE_TABLE.to_string()),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
