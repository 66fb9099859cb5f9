//! Install and activate transitions.
//!
//! The worker moves `Installing → Activating → Serving` and never back.
//! Install may be repeated while still installing; everything else that
//! arrives out of order is rejected so the host sees the failure.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;
use swcache_client::{Network, resolve};
use swcache_core::{AppConfig, CacheStorage, Error, Request, RequestKey, Response, is_owned_by};
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Activating,
    Serving,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Activating => "activating",
            LifecycleState::Serving => "serving",
        }
    }
}

/// What the host should do once a lifecycle step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Replace any waiting previous worker immediately.
    SkipWaiting,
    /// Take control of every open client without a reload.
    Claim,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub bucket: String,
    pub stored: usize,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
    pub signal: Signal,
}

struct Phase {
    state: LifecycleState,
    installed: bool,
}

pub struct Lifecycle {
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    config: Arc<AppConfig>,
    origin: Url,
    phase: RwLock<Phase>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn CacheStorage>, network: Arc<dyn Network>, config: Arc<AppConfig>, origin: Url) -> Self {
        let phase = RwLock::new(Phase { state: LifecycleState::Installing, installed: false });
        Self { store, network, config, origin, phase }
    }

    pub async fn state(&self) -> LifecycleState {
        self.phase.read().await.state
    }

    /// Precache every manifest entry into the precache bucket.
    ///
    /// All entries are fetched before anything is written; one failed or
    /// non-ok fetch fails the whole install and leaves the store untouched.
    /// The entries are then written as a single batch, so a failed write
    /// leaves the precache bucket without any of them.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` once activation has started
    /// - `PrecacheFailed` if an entry cannot be resolved or fetched
    /// - store errors from opening the bucket or writing entries
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let state = self.state().await;
        if state != LifecycleState::Installing {
            return Err(Error::InvalidTransition { event: "install", state: state.as_str() });
        }

        tracing::info!(
            version = %self.config.version,
            bucket = %self.config.precache_bucket,
            entries = self.config.static_cache_items.len(),
            "installing"
        );

        let fetches = self.config.static_cache_items.iter().map(|path| self.precache_fetch(path));
        let fetched = try_join_all(fetches).await?;

        let bucket = self.store.open_bucket(&self.config.precache_bucket).await?;
        self.store.put_all(&bucket, &fetched).await?;

        self.phase.write().await.installed = true;
        tracing::info!(version = %self.config.version, stored = fetched.len(), "install complete");

        Ok(InstallReport { bucket: bucket.name().to_string(), stored: fetched.len(), signal: Signal::SkipWaiting })
    }

    async fn precache_fetch(&self, path: &str) -> Result<(RequestKey, Response), Error> {
        let failed = |reason: String| Error::PrecacheFailed { path: path.to_string(), reason };

        let url = resolve(&self.origin, path).map_err(|e| failed(e.to_string()))?;
        let request = Request::get(url.as_str())?;
        let response = self.network.fetch(&request).await.map_err(|e| failed(e.to_string()))?;
        if !response.is_ok() {
            return Err(failed(format!("status {}", response.status)));
        }

        Ok((RequestKey::from_request(&request), response))
    }

    /// Delete every bucket this version does not own.
    ///
    /// Deletions run concurrently. On failure the state stays `Activating`
    /// and whatever was not deleted remains; the host may signal again.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` before a successful install or after activation
    /// - store errors from listing or deleting buckets
    pub async fn on_activate(&self) -> Result<ActivateReport, Error> {
        {
            let mut phase = self.phase.write().await;
            match phase.state {
                LifecycleState::Installing if phase.installed => phase.state = LifecycleState::Activating,
                LifecycleState::Activating => {}
                state => return Err(Error::InvalidTransition { event: "activate", state: state.as_str() }),
            }
        }

        let version = &self.config.version;
        let (kept, stale): (Vec<String>, Vec<String>) =
            self.store.bucket_names().await?.into_iter().partition(|name| is_owned_by(name, version));

        try_join_all(stale.iter().map(|name| self.store.delete_bucket(name))).await?;

        self.phase.write().await.state = LifecycleState::Serving;
        tracing::info!(version = %version, deleted = ?stale, kept = ?kept, "activated");

        Ok(ActivateReport { deleted: stale, kept, signal: Signal::Claim })
    }
}
