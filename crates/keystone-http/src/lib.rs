//! keystone-http: REST API keywords
//!
//! An async HTTP client for test suites, with the assertions test authors
//! run against its responses.
//!
//! # Architecture
//!
//! - `RestClient`: reqwest-backed client holding base URL and default headers
//! - `RestRequest`: method, endpoint, JSON payload, headers and query params
//! - `RestResponse`: status, headers, body and latency of a completed request
//! - `json_path`: the JSONPath subset used for value extraction
//! - `schema`: JSON-schema loading and validation

pub mod client;
pub mod config;
pub mod json_path;
pub mod request;
pub mod response;
pub mod schema;

pub use client::RestClient;
pub use config::RestClientConfig;
pub use request::RestRequest;
pub use response::{RestResponse, RestResponseBuilder};

// Re-export shared HTTP types from keystone-common
pub use keystone_common::http::{HttpMethod, HttpStatus};
