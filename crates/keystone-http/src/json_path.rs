//! JSONPath subset used by the `Extract Json Value` keyword.
//!
//! Supported: `$` root (optional), `.name`, `['name']` / `["name"]`,
//! `[index]` with negative indices counting from the end, and the `.*` /
//! `[*]` wildcards.

use keystone_common::{KeywordError, Result};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(i64),
    Wildcard,
}

/// Parse a path expression into segments.
pub fn parse(path: &str) -> std::result::Result<Vec<Segment>, String> {
    let path = path.trim();
    let mut chars = path.chars().peekable();
    let mut segments = Vec::new();

    if chars.peek() == Some(&'$') {
        chars.next();
    } else if !path.is_empty() && !path.starts_with('[') && !path.starts_with('.') {
        // Bare "user.name" is read as "$.user.name"
        segments.push(read_name(&mut chars)?);
    }

    while let Some(c) = chars.next() {
        match c {
            '.' => segments.push(read_name(&mut chars)?),
            '[' => segments.push(read_bracket(&mut chars)?),
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(segments)
}

fn read_name(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> std::result::Result<Segment, String> {
    if chars.peek() == Some(&'*') {
        chars.next();
        return Ok(Segment::Wildcard);
    }

    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c == '.' || c == '[' {
            break;
        }
        name.push(c);
        chars.next();
    }

    if name.is_empty() {
        return Err("empty member name".to_string());
    }
    Ok(Segment::Key(name))
}

fn read_bracket(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> std::result::Result<Segment, String> {
    let mut inner = String::new();
    let mut quote: Option<char> = None;
    let mut closed = false;

    for c in chars.by_ref() {
        match (quote, c) {
            (None, ']') => {
                closed = true;
                break;
            }
            (None, '\'') | (None, '"') if inner.is_empty() => {
                quote = Some(c);
                inner.push(c);
            }
            (Some(q), c) if c == q => {
                quote = None;
                inner.push(c);
            }
            _ => inner.push(c),
        }
    }

    if !closed {
        return Err("unterminated '['".to_string());
    }

    let inner = inner.trim();
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    for q in ['\'', '"'] {
        if inner.len() >= 2 && inner.starts_with(q) && inner.ends_with(q) {
            return Ok(Segment::Key(inner[1..inner.len() - 1].to_string()));
        }
    }
    inner
        .parse::<i64>()
        .map(Segment::Index)
        .map_err(|_| format!("invalid index '{}'", inner))
}

/// Every node selected by `segments`, in document order.
pub fn select<'a>(root: &'a JsonValue, segments: &[Segment]) -> Vec<&'a JsonValue> {
    let mut current = vec![root];

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match segment {
                Segment::Key(key) => {
                    if let Some(child) = value.get(key.as_str()) {
                        next.push(child);
                    }
                }
                Segment::Index(index) => {
                    if let JsonValue::Array(items) = value {
                        let resolved = if *index < 0 {
                            items.len() as i64 + index
                        } else {
                            *index
                        };
                        if resolved >= 0 {
                            if let Some(child) = items.get(resolved as usize) {
                                next.push(child);
                            }
                        }
                    }
                }
                Segment::Wildcard => match value {
                    JsonValue::Array(items) => next.extend(items.iter()),
                    JsonValue::Object(map) => next.extend(map.values()),
                    _ => {}
                },
            }
        }
        current = next;
    }

    current
}

/// Evaluate `path` against `root`.
///
/// Paths containing a wildcard always yield an array of matches; other paths
/// yield the single selected value.
pub fn extract(root: &JsonValue, path: &str) -> Result<JsonValue> {
    let segments = parse(path)
        .map_err(|e| KeywordError::NotFound(format!("invalid JSONPath '{}': {}", path, e)))?;

    let matches = select(root, &segments);
    if matches.is_empty() {
        return Err(KeywordError::NotFound(format!("JSONPath '{}' matched nothing", path)));
    }

    if segments.contains(&Segment::Wildcard) {
        Ok(JsonValue::Array(matches.into_iter().cloned().collect()))
    } else {
        Ok(matches[0].clone())
    }
}
