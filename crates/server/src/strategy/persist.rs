//! Best-effort background writes of network responses.

use std::sync::Arc;

use swcache_core::{CacheStorage, Error, RequestKey, Response};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Spawns cache writes without making the caller wait for them.
///
/// A failed write is logged and otherwise ignored; the response already
/// handed to the page is unaffected.
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn CacheStorage>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Persister {
    pub fn new(store: Arc<dyn CacheStorage>) -> Self {
        Self { store, tasks: Arc::new(Mutex::new(JoinSet::new())) }
    }

    /// Queue a write of `snapshot` into `bucket` if it is cacheable.
    ///
    /// Returns whether a write was queued.
    pub async fn persist(&self, bucket: &str, key: &RequestKey, snapshot: Response) -> bool {
        if !snapshot.is_ok() {
            tracing::debug!(url = %key.url, status = snapshot.status, "not caching non-ok response");
            return false;
        }

        let store = Arc::clone(&self.store);
        let bucket = bucket.to_string();
        let key = key.clone();

        let mut tasks = self.tasks.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let result: Result<(), Error> = async {
                let handle = store.open_bucket(&bucket).await?;
                store.put(&handle, &key, &snapshot).await
            }
            .await;

            match result {
                Ok(()) => tracing::debug!(url = %key.url, bucket = %bucket, "cached response"),
                Err(e) => tracing::warn!(url = %key.url, bucket = %bucket, error = %e, "failed to cache response"),
            }
        });
        true
    }

    /// Wait for every queued write to finish.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.tasks.lock().await);
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "cache write task failed");
            }
        }
    }
}
