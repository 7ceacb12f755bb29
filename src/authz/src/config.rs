//! Runtime configuration
//!
//! Defaults suit an in-process deployment; every field can be overridden
//! from the environment.

use crate::engine::EngineConfig;
use crate::error::{AuthzError, Result};
use crate::resolver::CacheConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Postgres connection string; in-memory storage when absent
    pub database_url: Option<String>,

    /// Cache resolved permission sets
    pub cache_enabled: bool,

    /// Resolution cache time-to-live in seconds
    pub cache_ttl_secs: u64,

    /// Maximum number of cached users
    pub cache_capacity: usize,

    pub metrics_enabled: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            cache_enabled: true,
            cache_ttl_secs: 60,
            cache_capacity: 10_000,
            metrics_enabled: true,
        }
    }
}

impl AuthzConfig {
    /// Load configuration from environment variables
    ///
    /// | Variable               | Field            |
    /// |------------------------|------------------|
    /// | `DATABASE_URL`         | `database_url`   |
    /// | `RBAC_CACHE_ENABLED`   | `cache_enabled`  |
    /// | `RBAC_CACHE_TTL_SECS`  | `cache_ttl_secs` |
    /// | `RBAC_CACHE_CAPACITY`  | `cache_capacity` |
    /// | `RBAC_METRICS_ENABLED` | `metrics_enabled`|
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!("Loading configuration from environment");

        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.database_url = Some(url);
        }
        if let Some(value) = lookup("RBAC_CACHE_ENABLED") {
            config.cache_enabled = parse_flag("RBAC_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = lookup("RBAC_CACHE_TTL_SECS") {
            config.cache_ttl_secs = parse_value("RBAC_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = lookup("RBAC_CACHE_CAPACITY") {
            config.cache_capacity = parse_value("RBAC_CACHE_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("RBAC_METRICS_ENABLED") {
            config.metrics_enabled = parse_flag("RBAC_METRICS_ENABLED", &value)?;
        }

        Ok(config)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
            ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            enable_cache: self.cache_enabled,
            cache_config: self.cache_config(),
            enable_metrics: self.metrics_enabled,
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AuthzError::Config(format!("Invalid {}: {}", key, e)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AuthzError::Config(format!("Invalid {}: '{}'", key, other))),
    }
}
