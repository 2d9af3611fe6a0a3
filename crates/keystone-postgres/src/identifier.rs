//! SQL identifier validation and quoting.

use keystone_common::{KeywordError, Result};
use unicode_normalization::UnicodeNormalization;

/// Schema used when a table name carries no qualifier.
pub const DEFAULT_SCHEMA: &str = "public";

/// PostgreSQL truncates identifiers beyond this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Quotes a SQL identifier.
///
/// Handles schema-qualified names by quoting each part separately.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Validates a table or column name.
///
/// Supports both simple identifiers and schema-qualified names (e.g., "public.users").
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KeywordError::QueryError("Identifier cannot be empty".to_string()));
    }

    if name.contains('.') {
        let parts: Vec<&str> = name.split('.').collect();

        // Only allow schema.table format (two parts)
        if parts.len() != 2 {
            return Err(KeywordError::QueryError(format!(
                "Invalid schema-qualified identifier '{}': must be in format 'schema.table'",
                name
            )));
        }

        for part in parts {
            validate_identifier_part(part)?;
        }

        return Ok(());
    }

    validate_identifier_part(name)
}

/// Validates a single part of an identifier (no dots allowed).
pub fn validate_identifier_part(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KeywordError::QueryError(
            "Identifier part cannot be empty".to_string(),
        ));
    }

    // Compatibility forms (full-width letters, ligatures) would name a
    // different relation than the one they render as
    let normalized = name.nfkc().collect::<String>();
    if normalized != name {
        return Err(KeywordError::QueryError(format!(
            "Identifier '{}' is not in normalized form (NFKC: '{}')",
            name, normalized
        )));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(KeywordError::QueryError(format!(
            "Identifier '{}' exceeds maximum length of {}",
            name, MAX_IDENTIFIER_LEN
        )));
    }

    let first_char = name.chars().next().ok_or_else(|| {
        KeywordError::QueryError(format!("Identifier '{}' is empty or invalid", name))
    })?;
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(KeywordError::QueryError(format!(
            "Identifier '{}' must start with a letter or underscore",
            name
        )));
    }

    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            return Err(KeywordError::QueryError(format!(
                "Identifier '{}' contains invalid character '{}'",
                name, ch
            )));
        }
    }

    Ok(())
}

/// Validate a table name and split it into `(schema, table)`.
pub fn split_table_name(name: &str) -> Result<(&str, &str)> {
    validate_identifier(name)?;
    Ok(match name.split_once('.') {
        Some((schema, table)) => (schema, table),
        None => (DEFAULT_SCHEMA, name),
    })
}
