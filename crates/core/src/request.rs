//! Intercepted request value.

use std::collections::BTreeMap;

use url::Url;

use crate::Error;

/// An outbound request intercepted from a page.
///
/// Header names are stored lower-cased so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
}

impl Request {
    /// Build a request from raw parts, validating the URL.
    pub fn new(method: &str, url: &str) -> Result<Self, Error> {
        let url = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self { method: method.to_ascii_uppercase(), url, headers: BTreeMap::new() })
    }

    /// Shorthand for a GET request.
    pub fn get(url: &str) -> Result<Self, Error> {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// `scheme://host[:port]` of the request URL.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uppercases_method() {
        let req = Request::new("get", "https://example.com/css/site.css").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path(), "/css/site.css");
    }

    #[test]
    fn test_invalid_url() {
        let result = Request::get("not a url");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_header_case_insensitive() {
        let req = Request::get("https://example.com/").unwrap().with_header("Accept", "text/html");
        assert_eq!(req.header("accept"), Some("text/html"));
        assert_eq!(req.header("ACCEPT"), Some("text/html"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn test_origin_includes_port() {
        let req = Request::get("http://localhost:8080/js/site.js").unwrap();
        assert_eq!(req.origin(), "http://localhost:8080");

        let req = Request::get("https://example.com:443/").unwrap();
        assert_eq!(req.origin(), "https://example.com");
    }
}
