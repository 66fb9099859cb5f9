//! Bucket naming.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Class of an intercepted request; picks both the strategy and the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Versioned assets (stylesheets, scripts, images).
    Static,
    /// Pages whose freshest copy matters more than latency.
    Content,
}

impl ResourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Static => "static",
            ResourceClass::Content => "content",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket name for a resource class under a deployment version.
pub fn cache_name(class: ResourceClass, version: &str) -> String {
    format!("{version}-{class}")
}

/// Whether a bucket belongs to `version`.
///
/// A bucket is owned when it is named exactly after the version or carries
/// the `"{version}-"` prefix, so `v1` never claims `v10-static`.
pub fn is_owned_by(bucket: &str, version: &str) -> bool {
    match bucket.strip_prefix(version) {
        Some(rest) => rest.is_empty() || rest.starts_with('-'),
        None => false,
    }
}
