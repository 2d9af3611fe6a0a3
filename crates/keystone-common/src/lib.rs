//! Common utilities for keystone
//!
//! This crate provides functionality shared by every keyword library: the
//! failure taxonomy reported to the host runner, HTTP method/status types,
//! the libdoc keyword catalog and logging setup.

pub mod error;
pub mod http;
pub mod keyword;
pub mod logging;

pub use error::{ErrorKind, KeywordError, Result};
pub use http::{HttpMethod, HttpStatus};
pub use keyword::{keyword_name, ArgKind, KeywordArg, KeywordLibrary, KeywordSpec, LibraryDoc};
