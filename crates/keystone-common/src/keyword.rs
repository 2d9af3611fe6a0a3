//! Keyword catalog in the runner's libdoc JSON shape.
//!
//! Every keyword library describes its callable operations with a
//! [`LibraryDoc`], which editors and the `keystone libdoc` command export so
//! test authors can discover keywords and their arguments.

use serde::{Deserialize, Serialize};

/// How an argument may be passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgKind {
    PositionalOrNamed,
    NamedOnly,
}

/// A single keyword argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordArg {
    pub name: String,
    pub default_value: Option<String>,
    pub required: bool,
    pub kind: ArgKind,
}

impl KeywordArg {
    /// A required positional argument.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
            required: true,
            kind: ArgKind::PositionalOrNamed,
        }
    }

    /// An optional argument with a default value.
    pub fn optional(name: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: Some(default_value.into()),
            required: false,
            kind: ArgKind::PositionalOrNamed,
        }
    }
}

/// Documentation for one keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSpec {
    pub name: String,
    pub args: Vec<KeywordArg>,
    pub shortdoc: String,
}

impl KeywordSpec {
    /// Create a keyword from its method name (`snake_case` becomes `Title Case`).
    pub fn new(method: &str, shortdoc: impl Into<String>) -> Self {
        Self {
            name: keyword_name(method),
            args: Vec::new(),
            shortdoc: shortdoc.into(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: KeywordArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Multi-line call template used by editors when inserting the keyword.
    ///
    /// Keywords without arguments render as `Name    `; otherwise every
    /// argument goes on its own `...` continuation line.
    pub fn syntax(&self) -> String {
        if self.args.is_empty() {
            return format!("{}    ", self.name);
        }

        let lines: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                format!(
                    "    ...    {}=${{{}}}    ",
                    arg.name,
                    arg.default_value.as_deref().unwrap_or("")
                )
            })
            .collect();

        format!("{}    \n{}", self.name, lines.join("\n"))
    }
}

/// Documentation for a whole keyword library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDoc {
    pub name: String,
    pub doc: String,
    pub version: String,
    pub keywords: Vec<KeywordSpec>,
}

impl LibraryDoc {
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            keywords: Vec::new(),
        }
    }

    pub fn keyword(mut self, keyword: KeywordSpec) -> Self {
        self.keywords.push(keyword);
        self
    }

    /// Look up a keyword by its display name, ignoring case, spaces and underscores.
    pub fn find(&self, name: &str) -> Option<&KeywordSpec> {
        let wanted = normalize_name(name);
        self.keywords
            .iter()
            .find(|kw| normalize_name(&kw.name) == wanted)
    }

    /// Serialize to the libdoc JSON document.
    pub fn to_json(&self) -> serde_json::Value {
        // Serialization of plain strings and vectors cannot fail
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Implemented by every keyword library so its catalog can be exported.
pub trait KeywordLibrary {
    /// Library name as used in a test suite's `Library` import.
    const LIBRARY_NAME: &'static str;

    /// Describe the keywords this library exposes.
    fn library_doc() -> LibraryDoc;
}

/// Convert a `snake_case` method name to the runner's `Title Case` keyword name.
pub fn keyword_name(method: &str) -> String {
    method
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a [`KeywordSpec`] named after a method of a library type.
///
/// The method path is checked by the compiler, so a catalog entry cannot
/// outlive a renamed or removed operation.
///
/// ```ignore
/// keyword!(DatabaseSession::truncate_table, "Truncate specified table")
///     .arg(KeywordArg::required("table"))
/// ```
#[macro_export]
macro_rules! keyword {
    ($ty:ident $(<$($gen:ty),+>)? :: $method:ident, $shortdoc:expr) => {{
        let _ = $ty $(::<$($gen),+>)? ::$method;
        $crate::KeywordSpec::new(stringify!($method), $shortdoc)
    }};
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}
