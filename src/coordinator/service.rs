//! Lock service
//!
//! Owns the store connector, the connection pool and the procedure registry,
//! and runs every lock operation against them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{LockError, Result};
use crate::procedure::ProcedureRegistry;
use crate::protocol::{decode_response, Command, Operation, Outcome, MAX_LEASE_SECS};
use crate::store::{Connector, Recovery, RedisConnector, StoreConnection, StoreFault, StoreResult};
use super::guard::{ReadGuard, WriteGuard};
use super::wait::{Backoff, Wait};

/// A connection stamped with the generation it was opened in
struct Pooled<T> {
    conn: T,
    generation: u64,
}

/// Result of a single round trip
enum Attempt {
    Granted,
    Busy(String),
    Rejected(String),
    Faulted,
}

/// Distributed read-write lock client
///
/// ## Concurrency Model
///
/// - Every operation may be called from any number of threads at once.
/// - Each attempt takes one idle connection (or opens one), makes one round
///   trip and hands the connection back. No client-side lock is held while
///   waiting for the store or sleeping between attempts.
/// - Contention is resolved only inside the store procedure.
///
/// ## Recovery
///
/// - Connection lost: bump the generation, drain the pool, connect, ping,
///   reinstall the procedure. Serialized by `recovery`; a caller whose
///   failure predates the current generation skips the work.
/// - Procedure missing: reinstall on the connection that saw it.
/// - Anything else: drop the connection and let the caller retry.
pub struct LockService<C: Connector = RedisConnector> {
    config: Config,

    /// Rebuilds connections from the options it retained
    connector: C,

    registry: ProcedureRegistry,

    /// Idle connections from the current generation
    idle: ArrayQueue<Pooled<C::Connection>>,

    generation: AtomicU64,

    /// Serializes reconnects
    recovery: Mutex<()>,

    backoff: Backoff,
}

impl LockService<RedisConnector> {
    /// Connect to Redis as configured, probe it and install the procedure
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let connector = RedisConnector::new(&config)?;
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> LockService<C> {
    /// Start a service on any store
    ///
    /// On startup:
    /// 1. Validate config
    /// 2. Connect and probe liveness
    /// 3. Install the lock procedure
    ///
    /// Any failure here is returned; there is no degraded mode.
    pub fn with_connector(config: Config, connector: C) -> Result<Self> {
        config.validate()?;

        let registry = ProcedureRegistry::new();
        let mut conn = connector.connect()?;
        conn.ping()?;
        let handle = registry.install(&mut conn)?;

        let idle = ArrayQueue::new(config.pool_size);
        let _ = idle.push(Pooled {
            conn,
            generation: 0,
        });

        tracing::info!(
            "Lock service ready on {} (procedure {})",
            connector.describe(),
            handle
        );

        let backoff = Backoff::new(config.backoff_min_ms, config.backoff_max_ms);

        Ok(Self {
            config,
            connector,
            registry,
            idle,
            generation: AtomicU64::new(0),
            recovery: Mutex::new(()),
            backoff,
        })
    }

    // =========================================================================
    // Write Lock
    // =========================================================================

    /// Block until `holder` owns the write lock on `key`
    ///
    /// A non-positive `lease_secs` is replaced by the configured default, and
    /// one above [`MAX_LEASE_SECS`] is capped to it.
    pub fn acquire_write(&self, key: &str, holder: &str, lease_secs: i64) -> Result<()> {
        self.acquire_write_with(key, holder, lease_secs, &Wait::forever())
    }

    /// [`acquire_write`](Self::acquire_write) bounded by `wait`
    pub fn acquire_write_with(
        &self,
        key: &str,
        holder: &str,
        lease_secs: i64,
        wait: &Wait,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(LockError::EmptyKey { op: Operation::Lock });
        }
        let command = Command::Lock {
            key: key.to_string(),
            holder: holder.to_string(),
            lease_secs: self.lease(lease_secs),
        };
        self.acquire(&command, wait, true)
    }

    /// Release the write lock `holder` took on `key`
    ///
    /// Best effort: if no attempt is confirmed the lease still ends the lock,
    /// so exhaustion is logged rather than returned.
    pub fn release_write(&self, key: &str, holder: &str) -> Result<()> {
        let command = Command::Unlock {
            key: key.to_string(),
            holder: holder.to_string(),
        };
        match self.release(&command) {
            Err(LockError::ReleaseUnconfirmed { attempts, .. }) => {
                tracing::warn!(
                    "UNLOCK on '{}' unconfirmed after {} attempts, lease will expire it",
                    key,
                    attempts
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Acquire the write lock, released when the guard drops
    pub fn lock_write(&self, key: &str, holder: &str, lease_secs: i64) -> Result<WriteGuard<'_, C>> {
        self.lock_write_with(key, holder, lease_secs, &Wait::forever())
    }

    pub fn lock_write_with(
        &self,
        key: &str,
        holder: &str,
        lease_secs: i64,
        wait: &Wait,
    ) -> Result<WriteGuard<'_, C>> {
        self.acquire_write_with(key, holder, lease_secs, wait)?;
        Ok(WriteGuard::new(self, key, holder))
    }

    // =========================================================================
    // Read Lock
    // =========================================================================

    /// Block until a read share on `key` is granted
    pub fn acquire_read(&self, key: &str) -> Result<()> {
        self.acquire_read_with(key, &Wait::forever())
    }

    /// [`acquire_read`](Self::acquire_read) bounded by `wait`
    pub fn acquire_read_with(&self, key: &str, wait: &Wait) -> Result<()> {
        let command = Command::RLock {
            key: key.to_string(),
        };
        self.acquire(&command, wait, false)
    }

    /// Return a read share on `key`
    ///
    /// Read shares have no lease, so exhaustion is reported as
    /// [`LockError::ReleaseUnconfirmed`].
    pub fn release_read(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(LockError::EmptyKey {
                op: Operation::RUnlock,
            });
        }
        let command = Command::RUnlock {
            key: key.to_string(),
        };
        let result = self.release(&command);
        if let Err(e @ LockError::ReleaseUnconfirmed { .. }) = &result {
            tracing::warn!("{}, read share may be leaked", e);
        }
        result
    }

    /// Acquire a read share, released when the guard drops
    pub fn lock_read(&self, key: &str) -> Result<ReadGuard<'_, C>> {
        self.lock_read_with(key, &Wait::forever())
    }

    pub fn lock_read_with(&self, key: &str, wait: &Wait) -> Result<ReadGuard<'_, C>> {
        self.acquire_read_with(key, wait)?;
        Ok(ReadGuard::new(self, key))
    }

    // =========================================================================
    // Retry Loops
    // =========================================================================

    fn acquire(&self, command: &Command, wait: &Wait, rejection_fatal: bool) -> Result<()> {
        let op = command.operation();
        let key = command.key();

        loop {
            match self.attempt(command) {
                Attempt::Granted => {
                    tracing::trace!("{} on '{}' granted", op, key);
                    return Ok(());
                }
                Attempt::Rejected(message) if rejection_fatal => {
                    return Err(LockError::Domain {
                        op,
                        key: key.to_string(),
                        message,
                    });
                }
                Attempt::Rejected(message) => {
                    tracing::debug!("{} on '{}' rejected, retrying: {}", op, key, message);
                }
                Attempt::Busy(detail) => {
                    tracing::trace!("{} on '{}' busy: {}", op, key, detail);
                }
                Attempt::Faulted => {}
            }

            wait.check(op, key)?;
            thread::sleep(wait.clamp(self.backoff.delay()));
        }
    }

    fn release(&self, command: &Command) -> Result<()> {
        let op = command.operation();
        let key = command.key();
        let attempts = self.config.release_attempts;

        for attempt in 1..=attempts {
            match self.attempt(command) {
                Attempt::Granted => return Ok(()),
                Attempt::Rejected(message) => {
                    return Err(LockError::Domain {
                        op,
                        key: key.to_string(),
                        message,
                    });
                }
                Attempt::Busy(detail) => {
                    tracing::trace!("{} on '{}' busy: {}", op, key, detail);
                }
                Attempt::Faulted => {}
            }

            if attempt < attempts {
                thread::sleep(self.backoff.delay());
            }
        }

        Err(LockError::ReleaseUnconfirmed {
            op,
            key: key.to_string(),
            attempts,
        })
    }

    // =========================================================================
    // Single Attempt
    // =========================================================================

    fn attempt(&self, command: &Command) -> Attempt {
        let mut pooled = match self.checkout() {
            Ok(pooled) => pooled,
            Err(fault) => {
                tracing::warn!(
                    "{} on '{}': store unreachable: {}",
                    command.operation(),
                    command.key(),
                    fault
                );
                return Attempt::Faulted;
            }
        };

        let result = match self.registry.handle() {
            Some(handle) => pooled
                .conn
                .eval_sha(&handle, &command.keys(), &command.args()),
            None => Err(StoreFault::ScriptMissing),
        };

        let payload = match result {
            Ok(payload) => payload,
            Err(fault) => {
                tracing::warn!("{} on '{}' failed: {}", command.operation(), command.key(), fault);
                if !self.recover(pooled, &fault) {
                    tracing::debug!("Could not recover from {:?}, retrying later", fault.recovery());
                }
                return Attempt::Faulted;
            }
        };
        self.checkin(pooled);

        match decode_response(&payload) {
            Ok(response) => match response.outcome() {
                Outcome::Granted => Attempt::Granted,
                Outcome::Busy => Attempt::Busy(response.debug),
                Outcome::Rejected(message) => Attempt::Rejected(message),
            },
            Err(e) => {
                tracing::warn!(
                    "{} on '{}': undecodable reply {:?}: {}",
                    command.operation(),
                    command.key(),
                    payload,
                    e
                );
                Attempt::Faulted
            }
        }
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Run the recovery action for `fault`. Returns whether it succeeded.
    fn recover(&self, mut pooled: Pooled<C::Connection>, fault: &StoreFault) -> bool {
        match fault.recovery() {
            Recovery::Reinstall => match self.registry.install(&mut pooled.conn) {
                Ok(handle) => {
                    tracing::info!("Lock procedure reinstalled as {}", handle);
                    self.checkin(pooled);
                    true
                }
                Err(e) => {
                    tracing::warn!("Reinstalling lock procedure failed: {}", e);
                    false
                }
            },
            Recovery::Reconnect => {
                let observed = pooled.generation;
                drop(pooled);
                self.reconnect(observed)
            }
            Recovery::None => false,
        }
    }

    fn reconnect(&self, observed: u64) -> bool {
        let _guard = self.recovery.lock();

        if self.generation.load(Ordering::SeqCst) != observed {
            return true;
        }

        match self.open_connection() {
            Ok(conn) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                while self.idle.pop().is_some() {}
                let _ = self.idle.push(Pooled { conn, generation });
                tracing::info!(
                    "Reconnected to {} (generation {})",
                    self.connector.describe(),
                    generation
                );
                true
            }
            Err(e) => {
                tracing::warn!("Reconnect to {} failed: {}", self.connector.describe(), e);
                false
            }
        }
    }

    fn open_connection(&self) -> StoreResult<C::Connection> {
        let mut conn = self.connector.connect()?;
        conn.ping()?;
        self.registry.install(&mut conn)?;
        Ok(conn)
    }

    // =========================================================================
    // Pool
    // =========================================================================

    fn checkout(&self) -> StoreResult<Pooled<C::Connection>> {
        if let Some(pooled) = self.idle.pop() {
            return Ok(pooled);
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let conn = self.connector.connect()?;
        Ok(Pooled { conn, generation })
    }

    fn checkin(&self, pooled: Pooled<C::Connection>) {
        if pooled.generation == self.generation.load(Ordering::SeqCst) {
            // A full pool just drops the extra connection
            let _ = self.idle.push(pooled);
        }
    }

    fn lease(&self, lease_secs: i64) -> i64 {
        if lease_secs <= 0 {
            self.config.default_lease_secs
        } else if lease_secs > MAX_LEASE_SECS {
            tracing::debug!("Lease of {}s capped to {}s", lease_secs, MAX_LEASE_SECS);
            MAX_LEASE_SECS
        } else {
            lease_secs
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the store connector
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Get the procedure registry
    pub fn registry(&self) -> &ProcedureRegistry {
        &self.registry
    }

    /// Number of connection rebuilds so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Idle connections currently pooled
    pub fn idle_connections(&self) -> usize {
        self.idle.len()
    }
}
