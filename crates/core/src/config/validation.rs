//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::cache::naming::is_owned_by;
use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the manifest is empty, and
    /// `ConfigError::Invalid` if:
    /// - `version` is empty or contains whitespace
    /// - `origin` is not an http(s) URL with a host
    /// - a manifest entry or `offline_page` is not an absolute path
    /// - `cache_path_pattern` does not compile
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is set below 100ms or above 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.is_empty() {
            return Err(invalid("version", "must not be empty"));
        }
        if self.version.chars().any(char::is_whitespace) {
            return Err(invalid("version", "must not contain whitespace"));
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }
        if origin.host_str().is_none() {
            return Err(invalid("origin", "must include a host"));
        }

        if self.static_cache_items.is_empty() {
            return Err(ConfigError::Missing {
                field: "static_cache_items".into(),
                hint: "list at least the offline page so install has something to store".into(),
            });
        }
        if let Some(item) = self.static_cache_items.iter().find(|item| !item.starts_with('/')) {
            return Err(invalid("static_cache_items", format!("{item} is not an absolute path")));
        }
        if !self.offline_page.starts_with('/') {
            return Err(invalid("offline_page", "must be an absolute path"));
        }

        self.path_rule()?;

        if self.precache_bucket.is_empty() {
            return Err(invalid("precache_bucket", "must not be empty"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms < 100 {
                return Err(invalid("timeout_ms", "must be at least 100ms"));
            }
            if timeout_ms > 300_000 {
                return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !is_owned_by(&self.precache_bucket, &self.version) {
            tracing::warn!(
                precache_bucket = %self.precache_bucket,
                version = %self.version,
                "precache bucket is not prefixed by the version; activation will evict it"
            );
        }

        if !self.static_cache_items.contains(&self.offline_page) {
            tracing::warn!(offline_page = %self.offline_page, "offline page is not part of the install manifest");
        }

        Ok(())
    }
}
