//! Store capability consumed by the lifecycle manager and fetch strategies.

use std::collections::BTreeSet;

use async_trait::async_trait;
use url::Url;

use super::hash::RequestKey;
use crate::{Error, Response};

/// Handle to an opened bucket.
///
/// Only [`CacheStorage::open_bucket`] hands these out, so a `put` always
/// targets a bucket that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    name: String,
}

impl Bucket {
    /// Wrap a bucket name. Store implementations call this from `open_bucket`.
    pub fn opened(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Named-bucket blob store.
///
/// Implementations must tolerate concurrent reads and writes to different
/// keys; callers never serialize access.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a bucket, creating it if absent.
    async fn open_bucket(&self, name: &str) -> Result<Bucket, Error>;

    /// Find a stored response for `key` in any bucket, oldest bucket first.
    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Find a stored response for `key` in one bucket.
    async fn match_in(&self, bucket: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Store a snapshot of `response` under `key`, replacing any previous entry.
    async fn put(&self, bucket: &Bucket, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Store every entry in one batch. Either all of them land or none do.
    async fn put_all(&self, bucket: &Bucket, entries: &[(RequestKey, Response)]) -> Result<(), Error>;

    /// Delete a bucket and every entry in it. Returns whether it existed.
    async fn delete_bucket(&self, name: &str) -> Result<bool, Error>;

    /// Names of all buckets.
    async fn bucket_names(&self) -> Result<BTreeSet<String>, Error>;

    /// Number of entries in a bucket (0 when the bucket does not exist).
    async fn entry_count(&self, bucket: &str) -> Result<u64, Error>;

    /// Look up the offline fallback page by its path on `origin`.
    async fn match_offline(&self, origin: &Url, path: &str) -> Result<Option<Response>, Error> {
        let url = origin.join(path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        self.match_any(&RequestKey::from_url(&url)).await
    }
}
