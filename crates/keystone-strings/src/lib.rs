//! keystone-strings: stateless string keywords
//!
//! Pure text transformation and validation helpers. Nothing here touches
//! shared state, so every function can be called from any test context.

use std::sync::OnceLock;

use keystone_common::{KeywordArg, KeywordLibrary, KeywordSpec, LibraryDoc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;

/// Length used by the `Generate Random String` keyword when none is given.
pub const DEFAULT_RANDOM_LENGTH: usize = 10;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Generate a string of exactly `length` ASCII letters and digits.
///
/// Uses the thread-local RNG; not suitable for secrets.
pub fn generate_random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Format a 10-digit phone number as `(AAA) BBB-CCCC`.
///
/// All non-digit characters are stripped first. Input that does not reduce
/// to exactly ten digits is returned unchanged. Only ASCII `0-9` count as
/// digits; other Unicode decimal digits (e.g. Arabic-Indic `٣`) are stripped
/// like any other character.
pub fn format_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 10 {
        return raw.to_string();
    }
    format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
}

/// Check that `email` looks like `local@domain.tld`.
pub fn validate_email_format(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("valid regex"));
    re.is_match(email)
}

/// Every maximal run of ASCII digits in `text`, left to right.
///
/// Non-ASCII decimal digits are not matched (the pattern is `[0-9]`, not a
/// Unicode-aware `\d`), so `"x١٢٣"` yields no numbers.
pub fn extract_numbers_from_text(text: &str) -> Vec<String> {
    static DIGITS_RE: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS_RE.get_or_init(|| Regex::new(r"[0-9]+").expect("valid regex"));
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Keyword library facade over the string functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringUtils;

impl StringUtils {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_random_string(&self, length: Option<usize>) -> String {
        let length = length.unwrap_or(DEFAULT_RANDOM_LENGTH);
        tracing::trace!(length, "Generating random string");
        generate_random_string(length)
    }

    pub fn format_phone_number(&self, phone_number: &str) -> String {
        format_phone_number(phone_number)
    }

    pub fn validate_email_format(&self, email: &str) -> bool {
        validate_email_format(email)
    }

    pub fn extract_numbers_from_text(&self, text: &str) -> Vec<String> {
        extract_numbers_from_text(text)
    }
}

impl KeywordLibrary for StringUtils {
    const LIBRARY_NAME: &'static str = "StringUtils";

    fn library_doc() -> LibraryDoc {
        LibraryDoc::new(Self::LIBRARY_NAME, "String utility functions for test data.")
            .keyword(
                KeywordSpec::new(
                    "generate_random_string",
                    "Generate random string of specified length",
                )
                .arg(KeywordArg::optional("length", DEFAULT_RANDOM_LENGTH.to_string())),
            )
            .keyword(
                KeywordSpec::new("format_phone_number", "Format phone number to standard format")
                    .arg(KeywordArg::required("phone_number")),
            )
            .keyword(
                KeywordSpec::new(
                    "validate_email_format",
                    "Validate if email address has correct format",
                )
                .arg(KeywordArg::required("email")),
            )
            .keyword(
                KeywordSpec::new("extract_numbers_from_text", "Extract all numbers from text string")
                    .arg(KeywordArg::required("text")),
            )
    }
}
