//! Fetch strategies.
//!
//! A strategy is a fixed, ordered list of stages. Each stage either produces
//! a response or hands over to the next one:
//!
//! | class     | strategy      | stages                      |
//! |-----------|---------------|-----------------------------|
//! | `content` | network-first | network → cache → offline   |
//! | `static`  | cache-first   | cache → network → offline   |
//!
//! Cache misses and cache errors both fall through, as do transport failures
//! from the network. Any other network error ends the chain. A network
//! response with any status ends the chain; only ok responses are written
//! back. When every stage falls through the request resolves to
//! `OFFLINE_UNAVAILABLE`.

pub mod offline;
pub mod persist;

use std::sync::Arc;

use serde::Serialize;
use swcache_client::Network;
use swcache_core::{CacheStorage, Error, Request, RequestKey, ResourceClass, Response};

use crate::classify::Classification;
use offline::OfflineFallback;
use persist::Persister;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Network,
    Cache,
    Offline,
}

impl Strategy {
    pub fn for_class(class: ResourceClass) -> Self {
        match class {
            ResourceClass::Content => Strategy::NetworkFirst,
            ResourceClass::Static => Strategy::CacheFirst,
        }
    }

    pub fn stages(self) -> &'static [Stage] {
        match self {
            Strategy::NetworkFirst => &[Stage::Network, Stage::Cache, Stage::Offline],
            Strategy::CacheFirst => &[Stage::Cache, Stage::Network, Stage::Offline],
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Offline,
}

/// A response ready to hand back to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
}

enum StageOutcome {
    Served(Served),
    Next(String),
    Failed(Error),
}

/// Runs strategies against the store and network capabilities.
#[derive(Clone)]
pub struct FetchEngine {
    store: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    offline: OfflineFallback,
    persister: Persister,
}

impl FetchEngine {
    pub fn new(store: Arc<dyn CacheStorage>, network: Arc<dyn Network>, offline: OfflineFallback) -> Self {
        let persister = Persister::new(Arc::clone(&store));
        Self { store, network, offline, persister }
    }

    /// Answer a classified request.
    ///
    /// # Errors
    ///
    /// Returns `Error::OfflineUnavailable` once every stage has fallen through,
    /// or the network error itself when it is not a transport failure.
    pub async fn respond(&self, request: &Request, classification: &Classification) -> Result<Served, Error> {
        let strategy = Strategy::for_class(classification.class);
        let key = RequestKey::from_request(request);
        let mut reasons = Vec::new();

        for stage in strategy.stages() {
            match self.run_stage(*stage, request, &key, classification).await {
                StageOutcome::Served(served) => {
                    tracing::debug!(
                        url = %key.url,
                        strategy = ?strategy,
                        source = ?served.source,
                        status = served.response.status,
                        "served request"
                    );
                    return Ok(served);
                }
                StageOutcome::Next(reason) => {
                    tracing::debug!(url = %key.url, stage = ?stage, reason = %reason, "falling through");
                    reasons.push(reason);
                }
                StageOutcome::Failed(e) => {
                    tracing::warn!(url = %key.url, stage = ?stage, error = %e, "request failed");
                    return Err(e);
                }
            }
        }

        Err(Error::OfflineUnavailable(format!("{}: {}", key.url, reasons.join("; "))))
    }

    /// Wait for background cache writes started by earlier requests.
    pub async fn settle(&self) {
        self.persister.settle().await;
    }

    async fn run_stage(
        &self, stage: Stage, request: &Request, key: &RequestKey, classification: &Classification,
    ) -> StageOutcome {
        match stage {
            Stage::Network => match self.network.fetch(request).await {
                Ok(response) => {
                    self.persister
                        .persist(&classification.bucket, key, response.clone())
                        .await;
                    StageOutcome::Served(Served { response, source: ResponseSource::Network })
                }
                Err(e) if e.is_transport() => StageOutcome::Next(e.to_string()),
                Err(e) => StageOutcome::Failed(e),
            },
            Stage::Cache => match self.store.match_any(key).await {
                Ok(Some(response)) => StageOutcome::Served(Served { response, source: ResponseSource::Cache }),
                Ok(None) => StageOutcome::Next(Error::CacheMiss(key.url.clone()).to_string()),
                Err(e) => {
                    tracing::warn!(url = %key.url, error = %e, "cache lookup failed, treating as miss");
                    StageOutcome::Next(e.to_string())
                }
            },
            Stage::Offline => match self.offline.respond(self.store.as_ref(), classification).await {
                Ok(response) => StageOutcome::Served(Served { response, source: ResponseSource::Offline }),
                Err(e) => StageOutcome::Next(e.to_string()),
            },
        }
    }
}
