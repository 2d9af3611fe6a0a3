//! JSON-schema loading and validation

use std::path::Path;

use keystone_common::{KeywordError, Result};
use serde_json::Value as JsonValue;

fn load_failure(msg: String) -> KeywordError {
    KeywordError::SchemaViolation {
        violations: vec![msg],
    }
}

/// Load a schema from a file path, or parse it inline when it starts with `{`.
pub fn load_schema(source: &str) -> Result<JsonValue> {
    let text = if source.trim_start().starts_with('{') {
        source.to_string()
    } else {
        std::fs::read_to_string(Path::new(source))
            .map_err(|e| load_failure(format!("cannot read schema '{}': {}", source, e)))?
    };

    serde_json::from_str(&text)
        .map_err(|e| load_failure(format!("schema '{}' is not valid JSON: {}", source, e)))
}

/// Validate `instance`, collecting every violated constraint.
///
/// The draft is taken from the schema's `$schema` keyword.
pub fn validate(instance: &JsonValue, schema: &JsonValue) -> Result<()> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| load_failure(format!("invalid schema: {}", e)))?;

    let violations: Vec<String> = validator
        .iter_errors(instance)
        .map(|error| error.to_string())
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        tracing::debug!(count = violations.len(), "Schema validation failed");
        Err(KeywordError::SchemaViolation { violations })
    }
}
