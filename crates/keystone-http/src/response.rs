//! HTTP response wrapper and the assertions keywords run against it

use std::collections::HashMap;
use std::time::Duration;

use keystone_common::{HttpStatus, KeywordError, Result};

use crate::{json_path, schema};

/// Immutable HTTP response with built-in latency measurement
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    /// HTTP status code
    pub status_code: u16,

    /// Response headers
    pub headers: HashMap<String, String>,

    /// Response body as bytes
    pub body: Vec<u8>,

    /// Request latency in milliseconds
    pub latency_ms: u64,

    /// Final URL (may differ from request URL due to redirects)
    pub url: String,
}

impl RestResponse {
    /// Status as a typed value
    pub fn status(&self) -> HttpStatus {
        HttpStatus(self.status_code)
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// Get body as text (UTF-8, lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON, failing with `NotJson`
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.body).map_err(KeywordError::from)
    }

    /// Get latency as Duration
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        // Case-insensitive header lookup
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Check if content type is JSON (`application/json` or any `+json` type)
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| {
                let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
                mime == "application/json" || mime.ends_with("+json")
            })
            .unwrap_or(false)
    }

    /// Succeed when the status equals `expected`, otherwise `AssertionFailed`.
    pub fn expect_status(&self, expected: u16) -> Result<()> {
        if self.status_code == expected {
            return Ok(());
        }
        Err(KeywordError::assertion(
            format!(
                "Expected status {} but got {} from {}",
                HttpStatus(expected),
                self.status(),
                self.url
            ),
            expected,
            self.status_code,
        ))
    }

    /// Evaluate a JSONPath expression against the parsed body.
    pub fn json_value(&self, path: &str) -> Result<serde_json::Value> {
        let body = self.json()?;
        json_path::extract(&body, path)
    }

    /// Validate the parsed body against a schema file path or inline schema.
    pub fn validate_schema(&self, schema_source: &str) -> Result<()> {
        let body = self.json()?;
        let schema = schema::load_schema(schema_source)?;
        schema::validate(&body, &schema)
    }

    /// Convert a reqwest response, reading the whole body.
    pub async fn from_reqwest(response: reqwest::Response, latency_ms: u64) -> Result<Self> {
        let status_code = response.status().as_u16();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (name, value) in response.headers().iter() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        let body = response.bytes().await?.to_vec();

        Ok(Self {
            status_code,
            headers,
            body,
            latency_ms,
            url,
        })
    }
}

/// Builder for creating RestResponse without a server (fixtures, replayed responses)
#[derive(Debug, Default)]
pub struct RestResponseBuilder {
    status_code: Option<u16>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    latency_ms: u64,
    url: String,
}

impl RestResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and the matching content type
    pub fn json_body(self, value: &serde_json::Value) -> Self {
        self.header("Content-Type", "application/json")
            .body(value.to_string())
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn build(self) -> RestResponse {
        RestResponse {
            status_code: self.status_code.unwrap_or(200),
            headers: self.headers,
            body: self.body,
            latency_ms: self.latency_ms,
            url: self.url,
        }
    }
}
