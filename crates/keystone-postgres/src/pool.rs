//! Bounded connection pool.
//!
//! The pool owns idle connections and hands them out one at a time. At most
//! `max` connections exist at once (`idle + checked out <= max`); an
//! `acquire` on an exhausted pool waits for a `release`, optionally bounded
//! by [`PoolConfig::acquire_timeout`].

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::postgres::PgConnection;
use sqlx::Connection as _;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use keystone_common::error::sanitize_error_message;
use keystone_common::{keyword, KeywordArg, KeywordError, KeywordLibrary, LibraryDoc, Result};

use crate::params::ConnectParams;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Opens and closes the connections a pool manages.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    async fn connect(&self) -> Result<Self::Connection>;

    async fn close(&self, conn: Self::Connection);
}

/// Opens PostgreSQL connections for fixed parameters.
#[derive(Debug, Clone)]
pub struct PgConnector {
    params: ConnectParams,
}

impl PgConnector {
    pub fn new(params: ConnectParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection> {
        let options = self.params.connect_options()?;
        PgConnection::connect_with(&options).await.map_err(|e| {
            KeywordError::ConnectionFailed(sanitize_error_message(&e.to_string()))
        })
    }

    async fn close(&self, conn: PgConnection) {
        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close pooled connection");
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections opened when the pool is created.
    pub min_connections: usize,
    /// Upper bound on idle plus checked-out connections.
    pub max_connections: usize,
    /// How long `acquire` waits on an exhausted pool; `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            acquire_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Validate and build a configuration.
    ///
    /// Sizes arrive as signed integers from test scripts; negative sizes,
    /// `min > max` and `max == 0` are rejected with `InvalidPoolSize`.
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min < 0 || max <= 0 || min > max {
            return Err(KeywordError::InvalidPoolSize { min, max });
        }
        Ok(Self {
            min_connections: min as usize,
            max_connections: max as usize,
            acquire_timeout: None,
        })
    }

    /// Bound the wait in `acquire`
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub in_use: usize,
    pub total: usize,
    pub max: usize,
    pub closed: bool,
}

struct PoolState<T> {
    idle: VecDeque<(u64, T)>,
    /// Idle plus checked out, including connections being opened
    total: usize,
    closed: bool,
    next_connection_id: u64,
}

struct PoolInner<C: Connector> {
    id: u64,
    connector: C,
    config: PoolConfig,
    state: Mutex<PoolState<C::Connection>>,
    released: Notify,
}

impl<C: Connector> PoolInner<C> {
    /// Give up a slot without returning a connection.
    fn forget_slot(&self) {
        let mut state = self.state.lock();
        state.total = state.total.saturating_sub(1);
        drop(state);
        self.released.notify_one();
    }
}

/// Frees the connection's slot if it is dropped without being released.
struct SlotGuard<C: Connector> {
    pool: Weak<PoolInner<C>>,
    armed: bool,
}

impl<C: Connector> Drop for SlotGuard<C> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(pool) = self.pool.upgrade() {
                pool.forget_slot();
            }
        }
    }
}

/// A connection checked out of a [`ConnectionPool`].
///
/// Give it back with [`ConnectionPool::release`]. Dropping it instead
/// discards the connection and frees its slot.
pub struct PooledConnection<C: Connector> {
    conn: C::Connection,
    pool_id: u64,
    id: u64,
    guard: SlotGuard<C>,
}

impl<C: Connector> PooledConnection<C> {
    /// Identifier unique within the owning pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl<C: Connector> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool_id", &self.pool_id)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

enum Checkout<T> {
    Ready(u64, T),
    Open(u64),
    Wait,
}

/// Bounded pool of connections produced by a [`Connector`].
pub struct ConnectionPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectionPool<PgConnector> {
    /// PostgreSQL pool for `params`.
    pub async fn connect(params: ConnectParams, config: PoolConfig) -> Result<Self> {
        Self::create(PgConnector::new(params), config).await
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Create a pool and open its minimum connections.
    ///
    /// If any of them fails, the ones already opened are closed and the
    /// connector's error is returned.
    #[instrument(skip(connector), fields(
        min_connections = config.min_connections,
        max_connections = config.max_connections
    ))]
    pub async fn create(connector: C, config: PoolConfig) -> Result<Self> {
        if config.max_connections == 0 || config.min_connections > config.max_connections {
            return Err(KeywordError::InvalidPoolSize {
                min: config.min_connections as i64,
                max: config.max_connections as i64,
            });
        }

        let mut opened = Vec::with_capacity(config.min_connections);
        for _ in 0..config.min_connections {
            match connector.connect().await {
                Ok(conn) => opened.push(conn),
                Err(e) => {
                    warn!(error = %e, opened = opened.len(), "Failed to open initial connections");
                    for conn in opened {
                        connector.close(conn).await;
                    }
                    return Err(e);
                }
            }
        }

        let total = opened.len();
        let idle: VecDeque<(u64, C::Connection)> = opened
            .into_iter()
            .enumerate()
            .map(|(idx, conn)| (idx as u64 + 1, conn))
            .collect();

        let pool = Self {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                connector,
                config,
                state: Mutex::new(PoolState {
                    idle,
                    total,
                    closed: false,
                    next_connection_id: total as u64 + 1,
                }),
                released: Notify::new(),
            }),
        };

        info!(pool_id = pool.inner.id, "Connection pool initialized");
        Ok(pool)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    fn checkout(&self, id: u64, conn: C::Connection) -> PooledConnection<C> {
        PooledConnection {
            conn,
            pool_id: self.inner.id,
            id,
            guard: SlotGuard {
                pool: Arc::downgrade(&self.inner),
                armed: true,
            },
        }
    }

    /// Check out a connection.
    ///
    /// Takes an idle connection if there is one, opens a new one while the
    /// pool is below `max`, and otherwise waits for a release.
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        let timeout = self.inner.config.acquire_timeout;
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

        loop {
            // Register for wakeups before inspecting the state so a release
            // between the check and the wait is not missed
            let released = self.inner.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let step = {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return Err(KeywordError::PoolClosed);
                }
                if let Some((id, conn)) = state.idle.pop_front() {
                    Checkout::Ready(id, conn)
                } else if state.total < self.inner.config.max_connections {
                    state.total += 1;
                    let id = state.next_connection_id;
                    state.next_connection_id += 1;
                    Checkout::Open(id)
                } else {
                    Checkout::Wait
                }
            };

            match step {
                Checkout::Ready(id, conn) => {
                    debug!(pool_id = self.inner.id, connection_id = id, "Reused idle connection");
                    return Ok(self.checkout(id, conn));
                }
                Checkout::Open(id) => {
                    return match self.inner.connector.connect().await {
                        Ok(conn) => {
                            debug!(pool_id = self.inner.id, connection_id = id, "Opened connection");
                            Ok(self.checkout(id, conn))
                        }
                        Err(e) => {
                            self.inner.forget_slot();
                            Err(e)
                        }
                    };
                }
                Checkout::Wait => match (deadline, timeout) {
                    (Some(deadline), Some(timeout)) => {
                        if tokio::time::timeout_at(deadline, released).await.is_err() {
                            debug!(pool_id = self.inner.id, "Timed out waiting for a connection");
                            return Err(KeywordError::AcquireTimeout(timeout));
                        }
                    }
                    _ => released.await,
                },
            }
        }
    }

    /// Return a connection to the idle set and wake one waiter.
    ///
    /// A connection from another pool is rejected with `ForeignConnection`
    /// and discarded. After [`drain`](Self::drain), released connections are
    /// closed instead of kept.
    pub async fn release(&self, conn: PooledConnection<C>) -> Result<()> {
        if conn.pool_id != self.inner.id {
            return Err(KeywordError::ForeignConnection {
                pool_id: self.inner.id,
                connection_id: conn.id,
            });
        }

        let PooledConnection {
            conn,
            id,
            mut guard,
            ..
        } = conn;
        guard.armed = false;

        let to_close = {
            let mut state = self.inner.state.lock();
            if state.closed {
                state.total = state.total.saturating_sub(1);
                Some(conn)
            } else {
                state.idle.push_back((id, conn));
                None
            }
        };

        match to_close {
            Some(conn) => {
                self.inner.connector.close(conn).await;
                debug!(pool_id = self.inner.id, connection_id = id, "Closed connection released after drain");
            }
            None => {
                self.inner.released.notify_one();
                debug!(pool_id = self.inner.id, connection_id = id, "Connection released");
            }
        }
        Ok(())
    }

    /// Close the pool.
    ///
    /// Idle connections are closed now, waiters fail with `PoolClosed`, and
    /// checked-out connections are closed when released.
    pub async fn drain(&self) {
        let idle: Vec<(u64, C::Connection)> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let idle: Vec<_> = state.idle.drain(..).collect();
            state.total = state.total.saturating_sub(idle.len());
            idle
        };
        self.inner.released.notify_waiters();

        let closed = idle.len();
        for (_, conn) in idle {
            self.inner.connector.close(conn).await;
        }
        info!(pool_id = self.inner.id, closed, "Connection pool drained");
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            idle: state.idle.len(),
            in_use: state.total - state.idle.len(),
            total: state.total,
            max: self.inner.config.max_connections,
            closed: state.closed,
        }
    }
}

impl KeywordLibrary for ConnectionPool<PgConnector> {
    const LIBRARY_NAME: &'static str = "PostgreSQLConnectionPool";

    fn library_doc() -> LibraryDoc {
        LibraryDoc::new(Self::LIBRARY_NAME, "Bounded pool of PostgreSQL connections.")
            .keyword(
                keyword!(
                    ConnectionPool<PgConnector>::connect,
                    "Open a pool with its minimum connections ready"
                )
                .arg(KeywordArg::required("params"))
                .arg(KeywordArg::required("config")),
            )
            .keyword(keyword!(
                ConnectionPool<PgConnector>::acquire,
                "Check out a connection, waiting while the pool is exhausted"
            ))
            .keyword(
                keyword!(ConnectionPool<PgConnector>::release, "Return a connection to the pool")
                    .arg(KeywordArg::required("connection")),
            )
            .keyword(keyword!(
                ConnectionPool<PgConnector>::drain,
                "Close the pool and its idle connections"
            ))
            .keyword(keyword!(ConnectionPool<PgConnector>::status, "Report idle and in-use counts"))
    }
}
