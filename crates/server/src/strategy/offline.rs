//! Offline placeholders served when network and cache both fail.

use swcache_core::{CacheStorage, Error, Response, ResourceClass};
use url::Url;

use crate::classify::Classification;

pub const OFFLINE_IMAGE_CONTENT_TYPE: &str = "image/svg+xml";

/// Everything needed to build a placeholder, captured from configuration.
#[derive(Debug, Clone)]
pub struct OfflineFallback {
    pub origin: Url,
    pub page_path: String,
    pub image_svg: Option<String>,
}

impl OfflineFallback {
    /// Pick the placeholder for a classified request.
    ///
    /// Content gets the cached offline page. Static requests that accept an
    /// image get the configured SVG. Anything else has nothing to offer.
    pub async fn respond(&self, store: &dyn CacheStorage, classification: &Classification) -> Result<Response, Error> {
        match classification.class {
            ResourceClass::Content => match store.match_offline(&self.origin, &self.page_path).await {
                Ok(Some(page)) => Ok(page),
                Ok(None) => Err(Error::OfflineUnavailable(format!("{} is not cached", self.page_path))),
                Err(e) => Err(Error::OfflineUnavailable(format!("{} lookup failed: {e}", self.page_path))),
            },
            ResourceClass::Static => match (&self.image_svg, classification.wants_image) {
                (Some(svg), true) => Ok(self.image(svg)),
                (None, true) => Err(Error::OfflineUnavailable("no offline image configured".into())),
                (_, false) => Err(Error::OfflineUnavailable("no placeholder for this asset".into())),
            },
        }
    }

    fn image(&self, svg: &str) -> Response {
        let mut response = Response::new(self.origin.as_str(), 200, svg.as_bytes().to_vec())
            .with_content_type(OFFLINE_IMAGE_CONTENT_TYPE);
        response
            .headers
            .push(("content-type".to_string(), OFFLINE_IMAGE_CONTENT_TYPE.to_string()));
        response
    }
}
