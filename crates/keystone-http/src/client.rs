//! REST keyword client

use std::collections::HashMap;
use std::time::Instant;

use keystone_common::{
    keyword, HttpMethod, KeywordArg, KeywordError, KeywordLibrary, LibraryDoc, Result,
};
use tracing::instrument;

use crate::config::RestClientConfig;
use crate::request::{merge_headers, resolve_url, RestRequest};
use crate::response::RestResponse;

/// HTTP client holding the suite-level base URL and default headers.
///
/// # Example
///
/// ```ignore
/// use keystone_http::{RestClient, RestClientConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = RestClient::new(RestClientConfig::new())?;
///     client.set_base_url("https://api.example.com");
///
///     let response = client.get("/users/1", None, None).await?;
///     client.validate_response_status(&response, 200)?;
///     let name = client.extract_json_value(&response, "$.name")?;
///     println!("{} in {}ms", name, response.latency_ms);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    config: RestClientConfig,
}

impl RestClient {
    /// Create a new client with the given configuration
    pub fn new(config: RestClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        builder = builder.gzip(true).brotli(true);

        if config.danger_accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        Ok(Self { client, config })
    }

    /// Create a client with default configuration
    pub fn default_client() -> Result<Self> {
        Self::new(RestClientConfig::default())
    }

    /// Get the base URL
    pub fn base_url(&self) -> Option<&str> {
        self.config.base_url.as_deref()
    }

    /// Get the default headers
    pub fn default_headers(&self) -> &HashMap<String, String> {
        &self.config.default_headers
    }

    /// Replace the base URL used for relative endpoints
    pub fn set_base_url(&mut self, url: &str) {
        self.config.base_url = Some(url.to_string());
    }

    /// Replace the headers sent with every request
    pub fn set_default_headers(&mut self, headers: HashMap<String, String>) {
        self.config.default_headers = headers;
    }

    /// Send a request.
    ///
    /// Any status code counts as a completed request; only transport, timeout
    /// and URL failures are errors.
    #[instrument(skip(self, request), fields(method = %request.method, endpoint = %request.endpoint))]
    pub async fn send(&self, request: RestRequest) -> Result<RestResponse> {
        let url = resolve_url(self.base_url(), &request.endpoint)?;

        let mut builder = self.client.request(to_reqwest_method(request.method), url);

        for (name, value) in merge_headers(&self.config.default_headers, &request.headers) {
            builder = builder.header(name, value);
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                let err = KeywordError::from(err);
                tracing::warn!(error = %err, "Request failed");
                return Err(err);
            }
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        let response = RestResponse::from_reqwest(response, latency_ms).await?;
        tracing::debug!(status = response.status_code, latency_ms, "Request completed");
        Ok(response)
    }

    /// Send a GET request
    pub async fn get(
        &self,
        endpoint: &str,
        headers: Option<HashMap<String, String>>,
        params: Option<HashMap<String, String>>,
    ) -> Result<RestResponse> {
        self.send(
            RestRequest::new(HttpMethod::Get, endpoint)
                .headers(headers)
                .params(params),
        )
        .await
    }

    /// Send a POST request with JSON body
    pub async fn post(
        &self,
        endpoint: &str,
        payload: serde_json::Value,
        headers: Option<HashMap<String, String>>,
    ) -> Result<RestResponse> {
        self.send(
            RestRequest::new(HttpMethod::Post, endpoint)
                .json(payload)
                .headers(headers),
        )
        .await
    }

    /// Send a PUT request with JSON body
    pub async fn put(
        &self,
        endpoint: &str,
        payload: serde_json::Value,
        headers: Option<HashMap<String, String>>,
    ) -> Result<RestResponse> {
        self.send(
            RestRequest::new(HttpMethod::Put, endpoint)
                .json(payload)
                .headers(headers),
        )
        .await
    }

    /// Send a DELETE request
    pub async fn delete(
        &self,
        endpoint: &str,
        headers: Option<HashMap<String, String>>,
    ) -> Result<RestResponse> {
        self.send(RestRequest::new(HttpMethod::Delete, endpoint).headers(headers))
            .await
    }

    /// Fail with `AssertionFailed` unless the response has the expected status
    pub fn validate_response_status(&self, response: &RestResponse, expected: u16) -> Result<()> {
        response.expect_status(expected)
    }

    /// Extract a value from the JSON body with a JSONPath expression
    pub fn extract_json_value(&self, response: &RestResponse, path: &str) -> Result<serde_json::Value> {
        response.json_value(path)
    }

    /// Validate the JSON body against a schema file (or inline schema document)
    pub fn validate_json_schema(&self, response: &RestResponse, schema_source: &str) -> Result<()> {
        response.validate_schema(schema_source)
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

impl KeywordLibrary for RestClient {
    const LIBRARY_NAME: &'static str = "RestApiLibrary";

    fn library_doc() -> LibraryDoc {
        LibraryDoc::new(Self::LIBRARY_NAME, "REST API testing keywords.")
            .keyword(
                keyword!(RestClient::set_base_url, "Set base URL for API requests")
                    .arg(KeywordArg::required("url")),
            )
            .keyword(
                keyword!(RestClient::set_default_headers, "Set default headers for all requests")
                    .arg(KeywordArg::required("headers")),
            )
            .keyword(
                keyword!(RestClient::get, "Send GET request")
                    .arg(KeywordArg::required("endpoint"))
                    .arg(KeywordArg::optional("headers", "None"))
                    .arg(KeywordArg::optional("params", "None")),
            )
            .keyword(
                keyword!(RestClient::post, "Send POST request with JSON body")
                    .arg(KeywordArg::required("endpoint"))
                    .arg(KeywordArg::required("payload"))
                    .arg(KeywordArg::optional("headers", "None")),
            )
            .keyword(
                keyword!(RestClient::put, "Send PUT request with JSON body")
                    .arg(KeywordArg::required("endpoint"))
                    .arg(KeywordArg::required("payload"))
                    .arg(KeywordArg::optional("headers", "None")),
            )
            .keyword(
                keyword!(RestClient::delete, "Send DELETE request")
                    .arg(KeywordArg::required("endpoint"))
                    .arg(KeywordArg::optional("headers", "None")),
            )
            .keyword(
                keyword!(RestClient::send, "Send a fully described request")
                    .arg(KeywordArg::required("request")),
            )
            .keyword(
                keyword!(RestClient::validate_response_status, "Validate response status code")
                    .arg(KeywordArg::required("response"))
                    .arg(KeywordArg::required("expected")),
            )
            .keyword(
                keyword!(
                    RestClient::extract_json_value,
                    "Extract value from JSON response using JSONPath"
                )
                .arg(KeywordArg::required("response"))
                .arg(KeywordArg::required("path")),
            )
            .keyword(
                keyword!(RestClient::validate_json_schema, "Validate response against JSON schema")
                    .arg(KeywordArg::required("response"))
                    .arg(KeywordArg::required("schema_source")),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = RestClientConfig::new()
            .base_url("https://api.example.com")
            .timeout_secs(30.0);

        let client = RestClient::new(config).unwrap();
        assert_eq!(client.base_url(), Some("https://api.example.com"));
    }

    #[test]
    fn test_setters_overwrite() {
        let mut client = RestClient::default_client().unwrap();
        assert!(client.base_url().is_none());

        client.set_base_url("https://first.test");
        client.set_base_url("https://second.test");
        assert_eq!(client.base_url(), Some("https://second.test"));

        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        client.set_default_headers(headers);

        let mut headers = HashMap::new();
        headers.insert("X-Api-Key".to_string(), "abc".to_string());
        client.set_default_headers(headers);

        assert_eq!(client.default_headers().len(), 1);
        assert!(client.default_headers().contains_key("X-Api-Key"));
    }

    #[test]
    fn test_library_doc() {
        let doc = RestClient::library_doc();
        assert_eq!(doc.name, "RestApiLibrary");
        assert_eq!(doc.keywords.len(), 10);
        assert!(doc.find("Get").is_some());
        assert!(doc.find("validate json schema").is_some());
    }

    #[test]
    fn test_library_doc_names_follow_methods() {
        let names: Vec<String> = RestClient::library_doc()
            .keywords
            .into_iter()
            .map(|kw| kw.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "Set Base Url",
                "Set Default Headers",
                "Get",
                "Post",
                "Put",
                "Delete",
                "Send",
                "Validate Response Status",
                "Extract Json Value",
                "Validate Json Schema",
            ]
        );
    }

    #[tokio::test]
    async fn test_relative_endpoint_without_base_url() {
        let client = RestClient::default_client().unwrap();
        let err = client.get("/users", None, None).await.unwrap_err();
        assert!(matches!(err, KeywordError::RequestFailed(_)));
    }
}
