//! Response value shared by the network, the store and the host.

/// A fully buffered HTTP response.
///
/// Cloning produces an independent snapshot; the store keeps its own copy
/// so the value handed back to the page is never shared with the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The URL the response was produced for (after redirects).
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { url: url.into(), status, content_type: None, headers: Vec::new(), body: body.into() }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// True for 2xx statuses, the only ones worth caching.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
