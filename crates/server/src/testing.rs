//! Test doubles for the network and store capabilities.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use swcache_client::Network;
use swcache_core::{Bucket, CacheDb, CacheStorage, Error, Request, RequestKey, Response};

pub const ORIGIN: &str = "http://localhost:8080";

pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

/// Scripted network: fixed responses per URL, 404 for anything else.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failures: Mutex<HashMap<String, fn() -> Error>>,
    hits: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, path: &str, status: u16, body: &str, content_type: &str) {
        self.route_bytes(path, status, body.as_bytes(), content_type);
    }

    pub fn route_bytes(&self, path: &str, status: u16, body: &[u8], content_type: &str) {
        let response = Response::new(url(path), status, body).with_content_type(content_type);
        self.routes.lock().unwrap().insert(url(path), response);
    }

    /// Make every fetch of `path` fail with `error`.
    pub fn fail_with(&self, path: &str, error: fn() -> Error) {
        self.failures.lock().unwrap().insert(url(path), error);
    }

    /// Serve every manifest entry that has no route yet with a 200.
    pub fn serve_manifest(&self, paths: &[String]) {
        let mut routes = self.routes.lock().unwrap();
        for path in paths {
            routes.entry(url(path)).or_insert_with(|| {
                Response::new(url(path), 200, format!("precached {path}")).with_content_type("text/plain")
            });
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(&url(path)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: connection refused", request.url)));
        }
        let key = request.url.to_string();
        if let Some(error) = self.failures.lock().unwrap().get(&key) {
            return Err(error());
        }
        *self.hits.lock().unwrap().entry(key.clone()).or_default() += 1;
        let routes = self.routes.lock().unwrap();
        Ok(routes
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Response::new(key, 404, "not found").with_content_type("text/plain")))
    }
}

/// In-memory store whose individual operations can be made to fail.
pub struct FlakyStore {
    pub inner: CacheDb,
    pub fail_put: AtomicBool,
    pub fail_match: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FlakyStore {
    pub async fn new() -> Self {
        Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            fail_put: AtomicBool::new(false),
            fail_match: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), Error> {
        if flag.load(Ordering::SeqCst) {
            return Err(Error::CorruptEntry(format!("{op} disabled for test")));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for FlakyStore {
    async fn open_bucket(&self, name: &str) -> Result<Bucket, Error> {
        self.inner.open_bucket(name).await
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        Self::check(&self.fail_match, "match")?;
        self.inner.match_any(key).await
    }

    async fn match_in(&self, bucket: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        Self::check(&self.fail_match, "match")?;
        self.inner.match_in(bucket, key).await
    }

    async fn put(&self, bucket: &Bucket, key: &RequestKey, response: &Response) -> Result<(), Error> {
        Self::check(&self.fail_put, "put")?;
        self.inner.put(bucket, key, response).await
    }

    async fn put_all(&self, bucket: &Bucket, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        Self::check(&self.fail_put, "put")?;
        self.inner.put_all(bucket, entries).await
    }

    async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete_bucket(name).await
    }

    async fn bucket_names(&self) -> Result<BTreeSet<String>, Error> {
        self.inner.bucket_names().await
    }

    async fn entry_count(&self, bucket: &str) -> Result<u64, Error> {
        self.inner.entry_count(bucket).await
    }
}
