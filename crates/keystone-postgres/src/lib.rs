//! PostgreSQL keywords for test suites.
//!
//! # Architecture
//!
//! ```text
//! Test script keywords (connect, execute, begin/commit, truncate, ...)
//!           |
//!    DatabaseSession  /  ConnectionPool<PgConnector>
//!           |
//!         SQLx (PostgreSQL driver)
//! ```
//!
//! - [`DatabaseSession`] holds one connection and tracks whether a
//!   transaction is open, so every keyword in a test case runs on the same
//!   connection.
//! - [`ConnectionPool`] hands out up to `max` connections from any
//!   [`Connector`], waiting (optionally bounded) when all are checked out.
//! - Parameters are [`SqlValue`]s bound positionally; results are ordered
//!   [`Row`]s. Table and column names are validated identifiers and never
//!   carry user SQL.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use keystone_postgres::{ConnectParams, DatabaseSession, QueryResult, SqlValue};
//!
//! # async fn example() -> keystone_postgres::Result<()> {
//! let mut session = DatabaseSession::new();
//! session.connect(&ConnectParams::from_env()).await?;
//!
//! let result = session
//!     .execute_query("SELECT id, name FROM users WHERE id = $1", &[SqlValue::Int(1)])
//!     .await?;
//! if let QueryResult::Rows(rows) = result {
//!     println!("{}", rows[0].to_json());
//! }
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod identifier;
pub mod params;
pub mod pool;
pub mod session;
pub mod transaction;
pub mod types;

pub use identifier::{quote_identifier, validate_identifier};
pub use params::ConnectParams;
pub use pool::{ConnectionPool, Connector, PgConnector, PoolConfig, PoolStatus, PooledConnection};
pub use session::{returns_rows, DatabaseSession};
pub use transaction::{SessionState, TransactionEnd};
pub use types::{row_to_values, ColumnInfo, QueryResult, Row, SqlValue};

pub use keystone_common::{KeywordError, Result};
