//! URL canonicalization for request keys and origin checks.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{path} resolves outside {origin}")]
    CrossOrigin { path: String, origin: String },
}

/// Canonicalize an absolute URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an http or https scheme
/// 3. Lowercase the host (done by the parser for special schemes)
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a manifest path against the protected origin.
///
/// The result must stay on `origin`; `//other.host/x` style paths are rejected.
pub fn resolve(origin: &Url, path: &str) -> Result<Url, UrlError> {
    let mut joined = origin.join(path).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    if joined.origin() != origin.origin() {
        return Err(UrlError::CrossOrigin { path: path.to_string(), origin: origin.origin().ascii_serialization() });
    }
    joined.set_fragment(None);
    Ok(joined)
}
