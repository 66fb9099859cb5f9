//! Service worker event dispatch.
//!
//! Routes the three host events to the lifecycle manager, the classifier
//! and the fetch strategies. All capabilities are injected, so the same
//! worker runs against SQLite and the real network in the binary and
//! against doubles in tests.

use std::sync::Arc;

use swcache_client::Network;
use swcache_core::{AppConfig, CacheStorage, ConfigError, Error, Request};

use crate::classify::{Classifier, Criteria, Decision};
use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle, LifecycleState};
use crate::strategy::offline::OfflineFallback;
use crate::strategy::{FetchEngine, Served};

/// Result of a fetch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The worker did not intercept; the host should let the request through.
    PassThrough(Criteria),
    Respond(Served),
}

/// The worker for one deployment version.
pub struct ServiceWorker {
    classifier: Classifier,
    engine: FetchEngine,
    lifecycle: Lifecycle,
}

impl ServiceWorker {
    /// Build a worker from validated configuration and its capabilities.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the origin or path pattern is malformed.
    pub fn new(
        config: AppConfig, store: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
    ) -> Result<Self, ConfigError> {
        let origin = config.origin_url()?;
        let classifier = Classifier::new(&config)?;
        let offline = OfflineFallback {
            origin: origin.clone(),
            page_path: config.offline_page.clone(),
            image_svg: config.offline_image.clone(),
        };
        let engine = FetchEngine::new(Arc::clone(&store), Arc::clone(&network), offline);
        let lifecycle = Lifecycle::new(store, network, Arc::new(config), origin);

        Ok(Self { classifier, engine, lifecycle })
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.lifecycle.on_install().await
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.lifecycle.on_activate().await
    }

    /// Handle an intercepted request.
    ///
    /// # Errors
    ///
    /// Returns `Error::OfflineUnavailable` when the request was intercepted
    /// but nothing could answer it.
    pub async fn fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let classification = match self.classifier.classify(request) {
            Decision::PassThrough(criteria) => return Ok(FetchOutcome::PassThrough(criteria)),
            Decision::Handle(classification) => classification,
        };

        let state = self.lifecycle.state().await;
        if state != LifecycleState::Serving {
            tracing::debug!(url = %request.url, state = state.as_str(), "fetch before activation completed");
        }

        self.engine
            .respond(request, &classification)
            .await
            .map(FetchOutcome::Respond)
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    /// Wait for background cache writes.
    pub async fn settle(&self) {
        self.engine.settle().await;
    }
}
