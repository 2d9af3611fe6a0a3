//! Session and transaction state.
//!
//! A session moves `Disconnected -> Connected -> (InTransaction <-> Connected)
//! -> Disconnected`. The transitions are checked here, before any SQL is sent.

use keystone_common::{KeywordError, Result};

/// Where a [`DatabaseSession`](crate::DatabaseSession) currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
    InTransaction,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        !matches!(self, SessionState::Disconnected)
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self, SessionState::InTransaction)
    }

    /// Connecting requires a disconnected session.
    pub fn check_connect(&self, target: &str) -> Result<()> {
        match self {
            SessionState::Disconnected => Ok(()),
            _ => Err(KeywordError::AlreadyConnected(target.to_string())),
        }
    }

    /// Statements need a live connection.
    pub fn check_usable(&self) -> Result<()> {
        match self {
            SessionState::Disconnected => {
                Err(KeywordError::ConnectionFailed("not connected".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// State after `BEGIN`, or the reason it is not allowed.
    pub fn begin(&self) -> Result<SessionState> {
        match self {
            SessionState::Disconnected => {
                Err(KeywordError::ConnectionFailed("not connected".to_string()))
            }
            SessionState::Connected => Ok(SessionState::InTransaction),
            SessionState::InTransaction => Err(KeywordError::TransactionAlreadyActive),
        }
    }

    /// State after `COMMIT` or `ROLLBACK`, or the reason it is not allowed.
    pub fn finish(&self) -> Result<SessionState> {
        match self {
            SessionState::Disconnected => {
                Err(KeywordError::ConnectionFailed("not connected".to_string()))
            }
            SessionState::Connected => Err(KeywordError::NoActiveTransaction),
            SessionState::InTransaction => Ok(SessionState::Connected),
        }
    }
}

/// How a transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEnd {
    Commit,
    Rollback,
}

impl TransactionEnd {
    /// Returns the SQL statement.
    pub fn to_sql(&self) -> &'static str {
        match self {
            TransactionEnd::Commit => "COMMIT",
            TransactionEnd::Rollback => "ROLLBACK",
        }
    }
}
