//! Connection pool
//!
//! A fixed-size pool of pre-connected [`Connection`]s. The pool is the
//! synchronization boundary of the crate: a connection handed out by
//! [`Pool::get`] is exclusively owned by the caller until the
//! [`PooledConnection`] guard releases it.
//!
//! Every acquisition re-validates the slot (reconnecting dead
//! connections in place), issues `RESET ALL` to clear session state, and
//! applies the caller's [`RlsContext`] session variables. Release resets
//! the session again and wakes one waiter.

mod bitmap;

use bitmap::SlotBitmap;

use crate::connection::{Config, Connection};
use crate::error::PoolError;
use crate::query::{ExtendedQuery, SimpleQuery};
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// Row-level-security session context: a set of `SET SESSION` variables
/// applied while a connection is held.
///
/// Keys are restricted to `[A-Za-z0-9_.]`; values are escaped by
/// single-quote doubling when applied.
#[derive(Debug, Clone, Default)]
pub struct RlsContext {
    settings: BTreeMap<String, String>,
}

impl RlsContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session variable, validating the key charset
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(PoolError::RlsContext(format!("invalid setting name {:?}", key)).into());
        }
        self.settings.insert(key, value.into());
        Ok(())
    }

    /// Whether the context has no settings
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Number of settings
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

struct PoolState {
    /// `None` marks a slot whose connection is currently handed out
    slots: Vec<Option<Connection>>,
    /// Bit set for every reusable (in-pool, connected-at-init) slot
    available: SlotBitmap,
    /// Invariant: equals `available.count_ones()`
    available_count: usize,
    closed: bool,
}

/// Fixed-size, thread-safe connection pool
pub struct Pool {
    state: Mutex<PoolState>,
    cond: Condvar,
    config: Config,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("config", &self.config).finish()
    }
}

impl Pool {
    /// Create a pool of `size` slots, connecting each one.
    ///
    /// Slots that fail to connect stay out of the available set until
    /// [`Pool::reset`]; if every slot fails the pool is not created.
    pub fn new(config: Config, size: usize) -> Result<Self> {
        config.validate()?;

        let mut slots = Vec::with_capacity(size);
        let mut available = SlotBitmap::new(size);
        let mut available_count = 0;

        for idx in 0..size {
            match Connection::connect_with(config.clone()) {
                Ok(conn) => {
                    slots.push(Some(conn));
                    available.set(idx);
                    available_count += 1;
                }
                Err(e) => {
                    tracing::warn!(slot = idx, "pool slot failed to connect: {}", e);
                    slots.push(Some(Connection::new(config.clone())));
                }
            }
        }

        if available_count == 0 {
            return Err(PoolError::InitializationFailed.into());
        }

        tracing::info!(size, connected = available_count, "connection pool ready");

        Ok(Self {
            state: Mutex::new(PoolState {
                slots,
                available,
                available_count,
                closed: false,
            }),
            cond: Condvar::new(),
            config,
        })
    }

    /// Total number of slots
    pub fn size(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Number of currently available connections
    pub fn available(&self) -> usize {
        let state = self.state.lock();
        debug_assert_eq!(state.available.count_ones(), state.available_count);
        state.available_count
    }

    /// Acquire a connection with the configured default timeout and no
    /// session context
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        self.get_with(None, None)
    }

    /// Acquire a connection without waiting.
    ///
    /// Fails with [`PoolError::NoAvailableConnections`] when every slot
    /// is handed out.
    pub fn try_get(&self) -> Result<PooledConnection<'_>> {
        let (idx, conn) = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::Closed.into());
            }
            if state.available_count == 0 {
                return Err(PoolError::NoAvailableConnections.into());
            }
            Self::take_lowest(&mut state)
        };
        self.prepare_acquired(idx, conn, None)
    }

    /// Acquire a connection, optionally applying a session context and
    /// overriding the configured timeout.
    ///
    /// A zero timeout waits without a deadline. A failed acquisition
    /// never leaves a connection checked out.
    pub fn get_with(
        &self,
        rls: Option<&RlsContext>,
        timeout: Option<Duration>,
    ) -> Result<PooledConnection<'_>> {
        let timeout = timeout.unwrap_or(self.config.acquire_timeout);
        let wait_start = Instant::now();

        let (idx, conn) = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::Closed.into());
            }

            let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);

            while state.available_count == 0 && !state.closed {
                match deadline {
                    Some(deadline) => {
                        if self.cond.wait_until(&mut state, deadline).timed_out()
                            && state.available_count == 0
                        {
                            crate::metrics::counters::pool_acquire_timeout();
                            return Err(PoolError::Timeout.into());
                        }
                    }
                    None => self.cond.wait(&mut state),
                }
            }

            if state.closed {
                return Err(PoolError::Closed.into());
            }

            Self::take_lowest(&mut state)
        };

        crate::metrics::histograms::pool_acquire_wait(wait_start.elapsed().as_millis() as u64);
        self.prepare_acquired(idx, conn, rls)
    }

    /// Explicitly release a pooled connection.
    ///
    /// Equivalent to dropping the guard; fails with
    /// [`PoolError::ConnectionNotFound`] when the guard belongs to a
    /// different pool.
    pub fn release(&self, conn: PooledConnection<'_>) -> Result<()> {
        if !std::ptr::eq(self, conn.pool) {
            return Err(PoolError::ConnectionNotFound.into());
        }
        drop(conn);
        Ok(())
    }

    /// Close and reconnect every in-pool slot, then wake all waiters.
    ///
    /// Slots currently handed out are untouched; they are re-validated
    /// when released. Fails when no slot could be reconnected.
    pub fn reset(&self) -> Result<()> {
        let mut connected = 0;
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::Closed.into());
            }

            for idx in 0..state.slots.len() {
                let Some(mut conn) = state.slots[idx].take() else {
                    continue;
                };
                let ok = conn.reconnect().is_ok();
                state.slots[idx] = Some(conn);

                let was_available = state.available.is_set(idx);
                if ok {
                    connected += 1;
                    if !was_available {
                        state.available.set(idx);
                        state.available_count += 1;
                    }
                } else if was_available {
                    state.available.clear(idx);
                    state.available_count -= 1;
                }
            }
        }
        self.cond.notify_all();

        if connected == 0 {
            return Err(PoolError::InitializationFailed.into());
        }
        Ok(())
    }

    /// Close every connection and wake all waiters with `PoolClosed`
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            for slot in state.slots.iter_mut() {
                if let Some(conn) = slot.as_mut() {
                    conn.close();
                }
            }
        }
        self.cond.notify_all();
    }

    /// Pop the lowest available slot; caller holds the lock and has
    /// checked `available_count > 0`
    fn take_lowest(state: &mut PoolState) -> (usize, Connection) {
        let idx = state
            .available
            .lowest_set()
            .expect("available_count > 0 implies a set bit");
        state.available.clear(idx);
        state.available_count -= 1;
        let conn = state.slots[idx]
            .take()
            .expect("available slot holds a connection");
        (idx, conn)
    }

    /// Health-check, session-reset and context application for a freshly
    /// taken slot. Runs outside the pool lock; the connection is
    /// exclusively owned here.
    fn prepare_acquired(
        &self,
        idx: usize,
        mut conn: Connection,
        rls: Option<&RlsContext>,
    ) -> Result<PooledConnection<'_>> {
        if !conn.is_alive() {
            crate::metrics::counters::pool_reconnected();
            if let Err(e) = conn.reconnect() {
                tracing::warn!(slot = idx, "pooled connection re-init failed: {}", e);
                // Leave the slot available so the next acquirer retries
                self.return_slot(idx, conn);
                return Err(PoolError::ConnectionFailed.into());
            }
        }

        // Clear any session state a previous holder left behind. Failure
        // is advisory; the connection may still serve the caller.
        if let Err(e) = run_command(&mut conn, "RESET ALL") {
            tracing::warn!(slot = idx, "RESET ALL on acquisition failed: {}", e);
        }

        if let Some(ctx) = rls.filter(|ctx| !ctx.is_empty()) {
            for (key, value) in ctx.iter() {
                let sql = format!(
                    "SET SESSION \"{}\" = '{}'",
                    key,
                    value.replace('\'', "''")
                );
                if let Err(e) = run_command(&mut conn, &sql) {
                    tracing::warn!(slot = idx, setting = key, "session context failed: {}", e);
                    let reset_failed = run_command(&mut conn, "RESET ALL").is_err();
                    self.return_slot(idx, conn);
                    return Err(if reset_failed {
                        PoolError::RlsResetFailed.into()
                    } else {
                        Error::Pool(PoolError::RlsContext(format!(
                            "SET SESSION {:?} failed: {}",
                            key, e
                        )))
                    });
                }
            }
        }

        crate::metrics::counters::pool_acquired();
        Ok(PooledConnection {
            pool: self,
            slot: idx,
            conn: Some(conn),
        })
    }

    /// Put a connection back and wake one waiter, guarding against
    /// double release
    fn return_slot(&self, idx: usize, conn: Connection) {
        {
            let mut state = self.state.lock();
            if state.closed {
                // Pool shut down while the connection was out; just drop it
                return;
            }
            if state.slots[idx].is_some() || state.available.is_set(idx) {
                tracing::warn!(slot = idx, "double release of pool slot ignored");
                return;
            }
            state.slots[idx] = Some(conn);
            state.available.set(idx);
            state.available_count += 1;
        }
        self.cond.notify_one();
    }

    /// Full release path: session reset, re-init of broken connections,
    /// then return to the pool
    fn release_slot(&self, idx: usize, mut conn: Connection) {
        if self.state.lock().closed {
            return;
        }

        if conn.is_alive() {
            if let Err(e) = run_command(&mut conn, "RESET ALL") {
                tracing::warn!(slot = idx, "RESET ALL on release failed: {}", e);
            }
        }

        if !conn.is_alive() {
            crate::metrics::counters::pool_reconnected();
            if let Err(e) = conn.reconnect() {
                // The slot stays available; the next acquirer retries
                tracing::warn!(slot = idx, "re-init on release failed: {}", e);
            }
        }

        crate::metrics::counters::pool_released();
        self.return_slot(idx, conn);
    }
}

/// Run a session-management statement, discarding the result shape
fn run_command(conn: &mut Connection, sql: &str) -> Result<()> {
    conn.simple().run::<()>(sql).map(|_| ())
}

/// Scoped handle over an acquired connection.
///
/// Dereferences to [`Connection`]; releases the slot back to the pool on
/// drop.
pub struct PooledConnection<'p> {
    pool: &'p Pool,
    slot: usize,
    conn: Option<Connection>,
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("slot", &self.slot)
            .finish()
    }
}

impl PooledConnection<'_> {
    /// Simple (text) query facade over the held connection
    pub fn simple(&mut self) -> SimpleQuery<'_> {
        self.conn_mut().simple()
    }

    /// Extended (Parse/Bind/Execute) query facade over the held
    /// connection
    pub fn extended(&mut self) -> ExtendedQuery<'_> {
        self.conn_mut().extended()
    }

    fn conn_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn_mut()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release_slot(self.slot, conn);
        }
    }
}
