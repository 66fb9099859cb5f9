//! Request classification.
//!
//! Decides whether an intercepted request is ours to answer and, if so,
//! which resource class (and therefore strategy and bucket) it belongs to.

use regex::Regex;
use serde::Serialize;
use swcache_core::{AppConfig, ConfigError, Request, ResourceClass};

/// Outcome of each handling criterion, evaluated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Criteria {
    pub matches_path_pattern: bool,
    pub is_get_request: bool,
    pub is_from_my_origin: bool,
}

impl Criteria {
    /// Names of the criteria that did not hold.
    pub fn failing(&self) -> Vec<&'static str> {
        [
            ("matches_path_pattern", self.matches_path_pattern),
            ("is_get_request", self.is_get_request),
            ("is_from_my_origin", self.is_from_my_origin),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect()
    }

    pub fn passes(&self) -> bool {
        self.failing().is_empty()
    }
}

/// Classification of a request the worker will answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub class: ResourceClass,
    /// Bucket successful network responses are written to.
    pub bucket: String,
    /// Whether an image placeholder is an acceptable offline answer.
    pub wants_image: bool,
}

/// What to do with an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not ours; let the request continue to the network untouched.
    PassThrough(Criteria),
    Handle(Classification),
}

/// Stateless classifier built once from configuration.
#[derive(Debug, Clone)]
pub struct Classifier {
    rule: Regex,
    origin: String,
    static_bucket: String,
    content_bucket: String,
}

impl Classifier {
    /// Build a classifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the path pattern or origin is malformed.
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            rule: config.path_rule()?,
            origin: config.origin_url()?.origin().ascii_serialization(),
            static_bucket: config.cache_name(ResourceClass::Static),
            content_bucket: config.cache_name(ResourceClass::Content),
        })
    }

    /// Evaluate every criterion without short-circuiting.
    pub fn criteria(&self, request: &Request) -> Criteria {
        Criteria {
            matches_path_pattern: self.rule.is_match(request.path()),
            is_get_request: request.method == "GET",
            is_from_my_origin: request.origin() == self.origin,
        }
    }

    pub fn classify(&self, request: &Request) -> Decision {
        let criteria = self.criteria(request);
        if !criteria.passes() {
            tracing::debug!(url = %request.url, failing = ?criteria.failing(), "passing request through");
            return Decision::PassThrough(criteria);
        }

        let section = self
            .rule
            .captures(request.path())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        let accept = request.header("accept");

        let class = resource_class(accept, section);
        let wants_image = accept.is_some_and(|a| a.contains("image")) || section == Some("images");

        let bucket = match class {
            ResourceClass::Static => &self.static_bucket,
            ResourceClass::Content => &self.content_bucket,
        };

        Decision::Handle(Classification { class, bucket: bucket.clone(), wants_image })
    }
}

/// Pages are content, everything else is a static asset.
///
/// An explicit `Accept` header decides on its own. Without one, the path
/// section does: dated posts and the site root are pages.
fn resource_class(accept: Option<&str>, section: Option<&str>) -> ResourceClass {
    match accept {
        Some(accept) if accept.contains("text/html") => ResourceClass::Content,
        Some(_) => ResourceClass::Static,
        None => match section {
            None => ResourceClass::Content,
            Some(s) if is_year(s) => ResourceClass::Content,
            Some(_) => ResourceClass::Static,
        },
    }
}

fn is_year(segment: &str) -> bool {
    segment.len() == 4 && segment.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(&AppConfig::default()).unwrap()
    }

    fn get(path: &str) -> Request {
        Request::get(&format!("http://localhost:8080{path}")).unwrap()
    }

    #[test]
    fn test_all_criteria_pass() {
        let c = classifier();
        let criteria = c.criteria(&get("/css/styles.css"));
        assert!(criteria.passes());
        assert!(criteria.failing().is_empty());
    }

    #[test]
    fn test_each_criterion_reported() {
        let c = classifier();

        let wrong_path = c.criteria(&get("/admin/"));
        assert_eq!(wrong_path.failing(), vec!["matches_path_pattern"]);

        let post = Request::new("POST", "http://localhost:8080/css/styles.css").unwrap();
        assert_eq!(c.criteria(&post).failing(), vec!["is_get_request"]);

        let foreign = Request::get("https://cdn.example.net/css/styles.css").unwrap();
        assert_eq!(c.criteria(&foreign).failing(), vec!["is_from_my_origin"]);
    }

    #[test]
    fn test_all_failures_reported_together() {
        let c = classifier();
        let request = Request::new("DELETE", "https://cdn.example.net/admin").unwrap();
        let criteria = c.criteria(&request);
        assert_eq!(criteria.failing(), vec!["matches_path_pattern", "is_get_request", "is_from_my_origin"]);
        assert!(!criteria.passes());
    }

    #[test]
    fn test_port_is_part_of_origin() {
        let c = classifier();
        let request = Request::get("http://localhost:9090/css/styles.css").unwrap();
        assert!(!c.criteria(&request).is_from_my_origin);
    }

    #[test]
    fn test_non_http_schemes_are_foreign() {
        let c = classifier();
        for raw in ["chrome-extension://abcdef/css/styles.css", "data:text/css,body{}"] {
            let request = Request::get(raw).unwrap();
            assert!(!c.criteria(&request).is_from_my_origin, "{raw}");
        }
    }

    #[test]
    fn test_bucket_follows_version() {
        let config = AppConfig { version: "hector".into(), ..Default::default() };
        let c = Classifier::new(&config).unwrap();
        let Decision::Handle(classification) = c.classify(&get("/js/site.js")) else { panic!("expected handle") };
        assert_eq!(classification.bucket, config.cache_name(ResourceClass::Static));
        assert_eq!(classification.bucket, "hector-static");
    }

    #[test]
    fn test_pass_through_decision() {
        let c = classifier();
        let decision = c.classify(&get("/api/items"));
        assert!(matches!(decision, Decision::PassThrough(criteria) if !criteria.matches_path_pattern));
    }

    #[test]
    fn test_html_accept_is_content() {
        let c = classifier();
        let request = get("/css/styles.css").with_header("Accept", "text/html,application/xhtml+xml");
        let Decision::Handle(classification) = c.classify(&request) else { panic!("expected handle") };
        assert_eq!(classification.class, ResourceClass::Content);
        assert_eq!(classification.bucket, "achilles-content");
    }

    #[test]
    fn test_asset_accept_is_static() {
        let c = classifier();
        let request = get("/2024/post/").with_header("Accept", "text/css,*/*;q=0.1");
        let Decision::Handle(classification) = c.classify(&request) else { panic!("expected handle") };
        assert_eq!(classification.class, ResourceClass::Static);
        assert_eq!(classification.bucket, "achilles-static");
        assert!(!classification.wants_image);
    }

    #[test]
    fn test_path_section_without_accept() {
        let c = classifier();
        let cases = [
            ("/", ResourceClass::Content),
            ("/2023/hello-world/", ResourceClass::Content),
            ("/css/styles.css", ResourceClass::Static),
            ("/js/site.js", ResourceClass::Static),
            ("/images/nyan-cat.gif", ResourceClass::Static),
        ];
        for (path, expected) in cases {
            let Decision::Handle(classification) = c.classify(&get(path)) else { panic!("{path} not handled") };
            assert_eq!(classification.class, expected, "{path}");
        }
    }

    #[test]
    fn test_wants_image() {
        let c = classifier();
        let Decision::Handle(by_path) = c.classify(&get("/images/nyan-cat.gif")) else { panic!() };
        assert!(by_path.wants_image);

        let request = get("/js/badge").with_header("Accept", "image/avif,image/webp,*/*");
        let Decision::Handle(by_accept) = c.classify(&request) else { panic!() };
        assert!(by_accept.wants_image);
        assert_eq!(by_accept.class, ResourceClass::Static);
    }

    #[test]
    fn test_is_year() {
        assert!(is_year("2024"));
        assert!(!is_year("css"));
        assert!(!is_year("202"));
    }
}
