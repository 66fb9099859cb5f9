//! Request key generation.

use sha2::{Digest, Sha256};
use url::Url;

use crate::Request;

/// Identity of a cached request.
///
/// Two requests are equivalent when their URLs match once the fragment is
/// dropped. Only GET responses are ever stored, so the method is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// Canonical URL the key was derived from.
    pub url: String,
    /// Hex-encoded SHA-256 digest.
    pub hash: String,
}

impl RequestKey {
    pub fn from_url(url: &Url) -> Self {
        let mut canonical = url.clone();
        canonical.set_fragment(None);
        let url = canonical.to_string();
        let hash = compute_request_key("GET", &url);
        Self { url, hash }
    }

    pub fn from_request(request: &Request) -> Self {
        Self::from_url(&request.url)
    }
}

/// Compute the digest for a method and canonical URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
