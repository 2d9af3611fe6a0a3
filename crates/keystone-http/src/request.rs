//! Request description, URL joining and header merging

use std::collections::HashMap;

use keystone_common::{HttpMethod, KeywordError, Result};
use url::Url;

/// A single keyword-level request.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    pub payload: Option<serde_json::Value>,
    pub headers: HashMap<String, String>,
    pub params: Vec<(String, String)>,
}

impl RestRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            payload: None,
            headers: HashMap::new(),
            params: Vec::new(),
        }
    }

    /// Attach a JSON payload
    pub fn json(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add every header from `headers`, if any
    pub fn headers(mut self, headers: Option<HashMap<String, String>>) -> Self {
        if let Some(headers) = headers {
            self.headers.extend(headers);
        }
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Add every query parameter from `params`, sorted by name for a stable URL
    pub fn params(mut self, params: Option<HashMap<String, String>>) -> Self {
        if let Some(params) = params {
            let mut params: Vec<_> = params.into_iter().collect();
            params.sort();
            self.params.extend(params);
        }
        self
    }
}

/// Join a base URL and an endpoint with exactly one `/` between them.
///
/// Absolute endpoints (`http://`, `https://`) are used as is, as is any
/// endpoint when no base URL is configured.
pub fn join_url(base_url: Option<&str>, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }

    match base_url.filter(|b| !b.is_empty()) {
        None => endpoint.to_string(),
        Some(base) if endpoint.is_empty() => base.to_string(),
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        ),
    }
}

/// Join and parse, failing with `RequestFailed` on a malformed URL.
pub fn resolve_url(base_url: Option<&str>, endpoint: &str) -> Result<Url> {
    let joined = join_url(base_url, endpoint);
    Url::parse(&joined)
        .map_err(|e| KeywordError::request_failed(format!("invalid URL '{}': {}", joined, e)))
}

/// Merge default and per-call headers; per-call values win, keys compared case-insensitively.
pub fn merge_headers(
    defaults: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = defaults
        .iter()
        .filter(|(name, _)| !overrides.keys().any(|o| o.eq_ignore_ascii_case(name)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.sort_by(|a, b| a.0.to_ascii_lowercase().cmp(&b.0.to_ascii_lowercase()));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_single_slash() {
        let base = Some("https://api.example.com/v1/");
        assert_eq!(join_url(base, "/users"), "https://api.example.com/v1/users");
        assert_eq!(join_url(base, "users"), "https://api.example.com/v1/users");
        assert_eq!(
            join_url(Some("https://api.example.com"), "users/1"),
            "https://api.example.com/users/1"
        );
    }

    #[test]
    fn test_join_url_edge_cases() {
        assert_eq!(join_url(None, "https://other.test/x"), "https://other.test/x");
        assert_eq!(
            join_url(Some("https://api.example.com"), "http://other.test/x"),
            "http://other.test/x"
        );
        assert_eq!(join_url(None, "/users"), "/users");
        assert_eq!(join_url(Some(""), "/users"), "/users");
        assert_eq!(
            join_url(Some("https://api.example.com"), ""),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_resolve_url_relative_without_base_fails() {
        let err = resolve_url(None, "/users").unwrap_err();
        assert!(matches!(err, KeywordError::RequestFailed(_)));
    }

    #[test]
    fn test_merge_headers_per_call_wins() {
        let mut defaults = HashMap::new();
        defaults.insert("Accept".to_string(), "application/json".to_string());
        defaults.insert("X-Trace".to_string(), "default".to_string());

        let mut overrides = HashMap::new();
        overrides.insert("x-trace".to_string(), "override".to_string());

        let merged = merge_headers(&defaults, &overrides);
        assert_eq!(
            merged,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("x-trace".to_string(), "override".to_string()),
            ]
        );
    }

    #[test]
    fn test_request_builder() {
        let mut params = HashMap::new();
        params.insert("b".to_string(), "2".to_string());
        params.insert("a".to_string(), "1".to_string());

        let request = RestRequest::new(HttpMethod::Post, "/items")
            .json(serde_json::json!({"name": "widget"}))
            .header("X-Custom", "value")
            .params(Some(params));

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.endpoint, "/items");
        assert!(request.headers.contains_key("X-Custom"));
        assert_eq!(
            request.params,
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
        );
    }
}
