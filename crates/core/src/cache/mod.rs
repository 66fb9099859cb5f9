//! Named-bucket cache store.
//!
//! Entries are grouped into buckets that can be opened, enumerated and
//! deleted as a whole. The [`CacheStorage`] trait is the capability handed to
//! the rest of the system; [`CacheDb`] implements it on SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Request keys derived with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Cascading eviction when a bucket is deleted

pub mod buckets;
pub mod connection;
pub mod hash;
pub mod migrations;
pub mod naming;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::RequestKey;
pub use naming::{ResourceClass, cache_name, is_owned_by};
pub use storage::{Bucket, CacheStorage};
