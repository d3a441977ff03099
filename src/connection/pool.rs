use super::{Connection, backend::Backend, command::Command, config::ConnectionConfig};
use crate::core::{Result, StoreError};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Connection pool
///
/// Hands out at most `max_connections` connections at a time. Idle
/// connections are reused; expired ones are dropped on the next borrow.
pub struct ConnectionPool {
    /// Pool configuration
    config: ConnectionConfig,
    /// Store the connections talk to
    backend: Arc<dyn Backend>,
    /// Idle connections
    available: Arc<Mutex<VecDeque<PooledConnection>>>,
    /// One permit per connection that may be checked out
    slots: Arc<Semaphore>,
    /// Total number of live connections, idle or checked out
    total_connections: Arc<AtomicUsize>,
    /// Next connection ID
    next_id: AtomicU64,
}

/// A connection from the pool
struct PooledConnection {
    connection: Connection,
    created_at: Instant,
    last_used: Instant,
}

impl PooledConnection {
    fn new(connection: Connection) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        if let Some(lifetime) = max_lifetime {
            self.created_at.elapsed() > lifetime
        } else {
            false
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        if let Some(timeout) = idle_timeout {
            self.last_used.elapsed() > timeout
        } else {
            false
        }
    }
}

impl ConnectionPool {
    /// Create a new connection pool over `backend`, dialing `min_connections` up front.
    pub async fn new(config: ConnectionConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            slots: Arc::new(Semaphore::new(config.max_connections)),
            config,
            backend,
            available: Arc::new(Mutex::new(VecDeque::new())),
            total_connections: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
        };

        // Pre-create minimum connections
        pool.ensure_min_connections().await?;

        Ok(pool)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get a connection from the pool
    ///
    /// Waits up to `connect_timeout` for a free slot. The connection goes
    /// back to the pool when the guard is dropped.
    pub async fn get_connection(&self) -> Result<PoolGuard> {
        let permit = tokio::time::timeout(
            self.config.connect_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        .map_err(|_| StoreError::transport("connection pool timeout: no connections available"))?
        .map_err(|_| StoreError::transport("connection pool is closed"))?;

        while let Some(mut pooled) = self.try_get_available()? {
            if self.config.test_on_borrow && pooled.connection.do_command(Command::Ping).await.is_err() {
                debug!(connection = pooled.connection.id(), "dropping connection that failed PING");
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
                continue;
            }
            return Ok(self.guard(pooled.connection, pooled.created_at, permit));
        }

        let connection = self.dial().await?;
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        Ok(self.guard(connection, Instant::now(), permit))
    }

    fn guard(&self, connection: Connection, created_at: Instant, permit: OwnedSemaphorePermit) -> PoolGuard {
        PoolGuard {
            connection: Some(connection),
            created_at,
            pool: Arc::clone(&self.available),
            total_connections: Arc::clone(&self.total_connections),
            _permit: permit,
        }
    }

    /// Try to get an available connection from the pool
    fn try_get_available(&self) -> Result<Option<PooledConnection>> {
        let mut available = self
            .available
            .lock()
            .map_err(|_| StoreError::transport("connection pool lock poisoned"))?;

        let before = available.len();
        available.retain(|pooled| {
            !pooled.is_expired(self.config.max_lifetime)
                && !pooled.is_idle_too_long(self.config.idle_timeout)
        });
        let removed = before - available.len();

        if removed > 0 {
            debug!(removed, "pruned expired idle connections");
            self.total_connections.fetch_sub(removed, Ordering::SeqCst);
        }

        Ok(available.pop_front())
    }

    /// Opens a new connection, authenticating and selecting the database when configured.
    async fn dial(&self) -> Result<Connection> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut connection = Connection::new(id, Arc::clone(&self.backend));

        if !self.config.password.is_empty() {
            connection
                .do_command(Command::Auth {
                    password: self.config.password.clone(),
                })
                .await?;
        }
        if self.config.database > 0 {
            connection
                .do_command(Command::Select {
                    index: self.config.database,
                })
                .await?;
        }

        debug!(connection = id, "dialed connection");
        Ok(connection)
    }

    /// Ensure minimum number of connections
    async fn ensure_min_connections(&self) -> Result<()> {
        while self.total_connections.load(Ordering::SeqCst) < self.config.min_connections {
            let connection = self.dial().await?;
            self.available
                .lock()
                .map_err(|_| StoreError::transport("connection pool lock poisoned"))?
                .push_back(PooledConnection::new(connection));
            self.total_connections.fetch_add(1, Ordering::SeqCst);
        }

        Ok(())
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let available = self.available.lock().map(|idle| idle.len()).unwrap_or(0);
        let total = self.total_connections.load(Ordering::SeqCst);

        PoolStats {
            total_connections: total,
            available_connections: available,
            active_connections: total.saturating_sub(available),
            max_connections: self.config.max_connections,
        }
    }

    /// Refuses further borrows and drops idle connections.
    pub fn close(&self) {
        self.slots.close();
        if let Ok(mut available) = self.available.lock() {
            let dropped = available.len();
            available.clear();
            self.total_connections.fetch_sub(dropped, Ordering::SeqCst);
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

/// RAII guard for pooled connections
///
/// Returns the connection to the pool when dropped. A connection left
/// inside MULTI, holding unread replies, or closed is discarded instead.
pub struct PoolGuard {
    connection: Option<Connection>,
    created_at: Instant,
    pool: Arc<Mutex<VecDeque<PooledConnection>>>,
    total_connections: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl PoolGuard {
    /// Get a reference to the connection
    pub fn connection(&mut self) -> &mut Connection {
        self.connection
            .as_mut()
            .expect("Connection already returned to pool")
    }
}

impl Deref for PoolGuard {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection
            .as_ref()
            .expect("Connection already returned to pool")
    }
}

impl DerefMut for PoolGuard {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection()
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        if !connection.is_active() || connection.is_in_transaction() || connection.has_pending() {
            warn!(
                connection = connection.id(),
                "discarding connection returned in an unusable state"
            );
            self.total_connections.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        match self.pool.lock() {
            Ok(mut pool) => pool.push_back(PooledConnection {
                connection,
                created_at: self.created_at,
                last_used: Instant::now(),
            }),
            Err(_) => {
                warn!("connection pool lock poisoned, dropping connection");
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}
