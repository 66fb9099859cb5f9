//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded value is immutable for the lifetime of the process. A new
//! deployment is a new `version`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{ResourceClass, cache_name};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment version tag; prefixes every bucket this deployment owns.
    ///
    /// Set via SWCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin of the page being protected (`scheme://host[:port]`).
    ///
    /// Requests to any other origin pass through untouched.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Paths fetched and stored during install, in order.
    #[serde(default = "default_static_cache_items")]
    pub static_cache_items: Vec<String>,

    /// Regex a request path must match to be handled.
    ///
    /// The first capture group, when present, names the top-level section
    /// (`2024`, `css`, `images`, ...) and feeds resource classification.
    #[serde(default = "default_cache_path_pattern")]
    pub cache_path_pattern: String,

    /// Bucket the install step fills with the manifest.
    #[serde(default = "default_precache_bucket")]
    pub precache_bucket: String,

    /// Path of the offline fallback page. Must be part of the manifest to be useful.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// SVG markup served for images when neither network nor cache can answer.
    #[serde(default = "default_offline_image")]
    pub offline_image: Option<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds. Unset means wait indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_version() -> String {
    "achilles".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_static_cache_items() -> Vec<String> {
    ["/images/nyan-cat.gif", "/css/styles.css", "/js/site.js", "/offline/", "/"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cache_path_pattern() -> String {
    r"^/(?:(20[0-9]{2}|css|images|js)/(.+)?)?$".into()
}

fn default_precache_bucket() -> String {
    "static".into()
}

fn default_offline_page() -> String {
    "/offline/".into()
}

fn default_offline_image() -> Option<String> {
    Some(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300"><rect width="400" height="300" fill="#e5e5e5"/><text x="200" y="150" font-family="sans-serif" font-size="20" text-anchor="middle" fill="#666">Offline</text></svg>"##
            .into(),
    )
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            static_cache_items: default_static_cache_items(),
            cache_path_pattern: default_cache_path_pattern(),
            precache_bucket: default_precache_bucket(),
            offline_page: default_offline_page(),
            offline_image: default_offline_image(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Bucket name for a resource class under this deployment's version.
    pub fn cache_name(&self, class: ResourceClass) -> String {
        cache_name(class, &self.version)
    }

    /// Parsed protected origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Compiled path rule.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the pattern does not compile.
    pub fn path_rule(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.cache_path_pattern)
            .map_err(|e| ConfigError::Invalid { field: "cache_path_pattern".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
