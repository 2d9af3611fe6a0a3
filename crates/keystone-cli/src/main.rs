//! keystone CLI
//!
//! Usage:
//!   keystone libdoc all                     Print every keyword catalog
//!   keystone libdoc RestApiLibrary          Print one library's catalog
//!   keystone libdoc postgres --syntax       Print call templates instead of JSON
//!   keystone libdoc pool                    Print the connection pool catalog
//!   keystone strings random --length 12     Generate a random string
//!   keystone strings phone "555.123.4567"   Format a phone number
//!   keystone strings email a@b.com          Validate an email address
//!   keystone strings numbers "abc123def45"  Extract digit runs
//!
//! Logging is controlled by `--log-level` or `RUST_LOG`.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use keystone_common::logging::init_logging;
use keystone_common::{KeywordLibrary, LibraryDoc};
use keystone_http::RestClient;
use keystone_postgres::{ConnectionPool, DatabaseSession, PgConnector};
use keystone_strings::{StringUtils, DEFAULT_RANDOM_LENGTH};

#[derive(Parser)]
#[command(name = "keystone")]
#[command(about = "Keyword libraries for acceptance tests", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", env = "KEYSTONE_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export keyword documentation
    Libdoc {
        /// Library name or alias, or `all`
        #[arg(default_value = "all")]
        library: String,

        /// Print keyword call templates instead of JSON
        #[arg(long)]
        syntax: bool,
    },
    /// Run string keywords
    Strings {
        #[command(subcommand)]
        action: StringsAction,
    },
}

#[derive(Subcommand)]
enum StringsAction {
    /// Generate a random alphanumeric string
    Random {
        #[arg(short, long, default_value_t = DEFAULT_RANDOM_LENGTH)]
        length: usize,
    },
    /// Format a 10-digit phone number as (AAA) BBB-CCCC
    Phone { raw: String },
    /// Validate an email address; exits with status 1 when invalid
    Email { address: String },
    /// Extract every run of digits as a JSON array
    Numbers { text: String },
}

/// Every library the CLI knows about.
fn all_libraries() -> Vec<LibraryDoc> {
    vec![
        StringUtils::library_doc(),
        RestClient::library_doc(),
        DatabaseSession::library_doc(),
        ConnectionPool::<PgConnector>::library_doc(),
    ]
}

/// Resolve a library name or short alias.
fn find_library(name: &str) -> Option<LibraryDoc> {
    let wanted = name.to_ascii_lowercase();
    let doc = match wanted.as_str() {
        "strings" | "stringutils" => StringUtils::library_doc(),
        "http" | "rest" | "restapilibrary" => RestClient::library_doc(),
        "postgres" | "postgresql" | "postgresqllibrary" => DatabaseSession::library_doc(),
        "pool" | "postgresqlconnectionpool" => ConnectionPool::<PgConnector>::library_doc(),
        _ => return None,
    };
    Some(doc)
}

fn select_libraries(name: &str) -> Result<Vec<LibraryDoc>> {
    if name.eq_ignore_ascii_case("all") {
        return Ok(all_libraries());
    }
    match find_library(name) {
        Some(doc) => Ok(vec![doc]),
        None => {
            let known: Vec<String> = all_libraries().into_iter().map(|d| d.name).collect();
            bail!("Unknown library '{}'. Known libraries: {}", name, known.join(", "))
        }
    }
}

fn render_libdoc(name: &str, syntax: bool) -> Result<String> {
    let docs = select_libraries(name)?;

    if syntax {
        let mut out = String::new();
        for doc in &docs {
            out.push_str(&format!("*** {} ***\n", doc.name));
            for kw in &doc.keywords {
                out.push_str(&kw.syntax());
                out.push_str("\n\n");
            }
        }
        return Ok(out.trim_end().to_string());
    }

    let value = match docs.as_slice() {
        [single] => single.to_json(),
        many => serde_json::Value::Array(many.iter().map(LibraryDoc::to_json).collect()),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn run_strings(action: StringsAction) -> Result<i32> {
    let strings = StringUtils::new();
    match action {
        StringsAction::Random { length } => {
            println!("{}", strings.generate_random_string(Some(length)));
        }
        StringsAction::Phone { raw } => {
            println!("{}", strings.format_phone_number(&raw));
        }
        StringsAction::Email { address } => {
            let valid = strings.validate_email_format(&address);
            println!("{}", valid);
            if !valid {
                return Ok(1);
            }
        }
        StringsAction::Numbers { text } => {
            let numbers = strings.extract_numbers_from_text(&text);
            println!("{}", serde_json::to_string(&numbers)?);
        }
    }
    Ok(0)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Libdoc { library, syntax } => {
            tracing::debug!(%library, syntax, "Rendering libdoc");
            println!("{}", render_libdoc(&library, syntax)?);
        }
        Commands::Strings { action } => {
            let exit_code = run_strings(action)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
