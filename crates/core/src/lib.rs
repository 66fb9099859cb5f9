//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Named-bucket cache store with SQLite backend
//! - Request/response value types and cache naming
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod response;

pub use cache::{Bucket, CacheDb, CacheStorage, RequestKey, ResourceClass, cache_name, is_owned_by};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use request::Request;
pub use response::Response;
