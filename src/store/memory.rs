//! In-memory store
//!
//! A process-local stand-in for the shared store. It runs the lock procedure
//! natively, one invocation at a time under a single mutex, so it gives the
//! same atomicity the real store gives its scripts.
//!
//! Mirrors `procedure/rwlock.lua` operation for operation, including argument
//! validation. A change to either must be made to both.
//!
//! ## Fault Injection
//! - `evict_scripts`: forget installed procedures (next call: `ScriptMissing`)
//! - `restart`: every open connection sees end-of-stream, procedures are
//!   forgotten, lock records survive as if persisted
//! - `set_available(false)`: connects and calls are refused
//! - `fail_next_calls(n)`: the next `n` procedure calls fail unclassified
//! - `reject_next_calls(n)`: the next `n` procedure calls reply with `errMsg`

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::protocol::{encode_response, Operation, Response, MAX_LEASE_SECS};
use super::{Connector, StoreConnection, StoreFault, StoreResult};

/// Per-key lock state
#[derive(Debug, Default)]
struct LockRecord {
    writer: Option<Writer>,
    readers: u64,
}

#[derive(Debug)]
struct Writer {
    holder: String,
    expires_at: Instant,
}

struct Inner {
    records: Mutex<BTreeMap<String, LockRecord>>,

    /// handle -> procedure source
    scripts: Mutex<HashMap<String, String>>,

    /// Bumped by `restart`; connections from older epochs are dead
    epoch: AtomicU64,
    available: AtomicBool,
    pending_failures: AtomicUsize,
    pending_rejections: AtomicUsize,

    script_loads: AtomicUsize,
    connections_opened: AtomicUsize,
}

/// Process-local atomic store
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty, reachable store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                records: Mutex::new(BTreeMap::new()),
                scripts: Mutex::new(HashMap::new()),
                epoch: AtomicU64::new(0),
                available: AtomicBool::new(true),
                pending_failures: AtomicUsize::new(0),
                pending_rejections: AtomicUsize::new(0),
                script_loads: AtomicUsize::new(0),
                connections_opened: AtomicUsize::new(0),
            }),
        }
    }

    // =========================================================================
    // Fault Injection
    // =========================================================================

    /// Forget every installed procedure
    pub fn evict_scripts(&self) {
        self.inner.scripts.lock().clear();
    }

    /// Simulate a server restart
    pub fn restart(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.evict_scripts();
    }

    /// Refuse (or accept again) connections and calls
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Make the next `count` procedure calls fail with an unclassified error
    pub fn fail_next_calls(&self, count: usize) {
        self.inner.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` procedure calls answer with an error message
    /// instead of running
    pub fn reject_next_calls(&self, count: usize) {
        self.inner.pending_rejections.store(count, Ordering::SeqCst);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Current live writer of `key`
    pub fn writer(&self, key: &str) -> Option<String> {
        let records = self.inner.records.lock();
        records
            .get(key)
            .and_then(|r| r.writer.as_ref())
            .filter(|w| w.expires_at > Instant::now())
            .map(|w| w.holder.clone())
    }

    /// Current read share count of `key`
    pub fn readers(&self, key: &str) -> u64 {
        self.inner.records.lock().get(key).map_or(0, |r| r.readers)
    }

    /// Number of procedures currently installed
    pub fn loaded_scripts(&self) -> usize {
        self.inner.scripts.lock().len()
    }

    /// Total successful `load_script` calls
    pub fn script_loads(&self) -> usize {
        self.inner.script_loads.load(Ordering::SeqCst)
    }

    /// Total connections handed out
    pub fn connections_opened(&self) -> usize {
        self.inner.connections_opened.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Procedure
    // =========================================================================

    fn take_injected(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn execute(&self, keys: &[&str], args: &[String]) -> StoreResult<String> {
        let (key, op) = match keys {
            [key, op] => (*key, *op),
            _ => {
                return Err(StoreFault::Other(format!(
                    "ERR lock procedure expects 2 keys, got {}",
                    keys.len()
                )))
            }
        };

        let response = match op.parse::<Operation>() {
            Ok(_) if Self::take_injected(&self.inner.pending_rejections) => {
                Response::rejected("injected rejection")
            }
            Ok(op) => self.apply(key, op, args),
            Err(_) => Response::rejected(format!("unknown operation: {}", op)),
        };

        encode_response(&response).map_err(|e| StoreFault::Other(e.to_string()))
    }

    fn apply(&self, key: &str, op: Operation, args: &[String]) -> Response {
        let mut records = self.inner.records.lock();
        let now = Instant::now();

        // An expired lease takes the whole record with it, like EXPIRE on the key
        let expired = records
            .get(key)
            .and_then(|r| r.writer.as_ref())
            .is_some_and(|w| w.expires_at <= now);
        if expired {
            records.remove(key);
        }

        let holder = args.first().map(String::as_str).unwrap_or("");

        match op {
            Operation::Lock => {
                if holder.is_empty() {
                    return Response::rejected("lock holder id is empty");
                }
                let expires_at = match args.get(1).and_then(|s| s.parse::<i64>().ok()) {
                    Some(secs) if secs > 0 && secs <= MAX_LEASE_SECS => {
                        now.checked_add(Duration::from_secs(secs as u64))
                    }
                    _ => None,
                };
                let Some(expires_at) = expires_at else {
                    return Response::rejected(format!(
                        "invalid lease: '{}'",
                        args.get(1).map(String::as_str).unwrap_or("")
                    ));
                };

                let record = records.entry(key.to_string()).or_default();
                if record.readers > 0 {
                    return Response::busy(format!("{} readers active", record.readers));
                }
                let renewed = match &record.writer {
                    Some(w) if w.holder != holder => {
                        return Response::busy(format!("held by {}", w.holder))
                    }
                    Some(_) => true,
                    None => false,
                };
                record.writer = Some(Writer {
                    holder: holder.to_string(),
                    expires_at,
                });
                Response::granted(if renewed { "lease renewed" } else { "acquired" })
            }
            Operation::Unlock => {
                let Some(record) = records.get_mut(key) else {
                    return Response::granted("not locked");
                };
                match &record.writer {
                    None => return Response::granted("not locked"),
                    Some(w) if w.holder != holder => {
                        return Response::granted(format!("held by {}", w.holder))
                    }
                    Some(_) => {}
                }
                record.writer = None;
                let readers = record.readers;
                if readers == 0 {
                    records.remove(key);
                }
                Response::granted("released")
            }
            Operation::RLock => {
                let record = records.entry(key.to_string()).or_default();
                if let Some(w) = &record.writer {
                    return Response::busy(format!("write locked by {}", w.holder));
                }
                record.readers += 1;
                Response::granted(format!("{} readers", record.readers))
            }
            Operation::RUnlock => {
                let readers = match records.get_mut(key) {
                    Some(record) if record.readers > 0 => {
                        record.readers -= 1;
                        record.readers
                    }
                    _ => return Response::rejected(format!("no read lock held on {}", key)),
                };
                if readers == 0 {
                    records.remove(key);
                }
                Response::granted(format!("{} readers left", readers))
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryStore {
    type Connection = MemoryConnection;

    fn connect(&self) -> StoreResult<MemoryConnection> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(StoreFault::ConnectionLost("connection refused".to_string()));
        }
        self.inner.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            store: self.clone(),
            epoch: self.inner.epoch.load(Ordering::SeqCst),
        })
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}

/// Connection to a [`MemoryStore`]
pub struct MemoryConnection {
    store: MemoryStore,
    epoch: u64,
}

impl MemoryConnection {
    fn check(&self) -> StoreResult<()> {
        let inner = &self.store.inner;
        if !inner.available.load(Ordering::SeqCst) {
            return Err(StoreFault::ConnectionLost("connection refused".to_string()));
        }
        if inner.epoch.load(Ordering::SeqCst) != self.epoch {
            return Err(StoreFault::ConnectionLost("unexpected end of stream".to_string()));
        }
        Ok(())
    }
}

impl StoreConnection for MemoryConnection {
    fn ping(&mut self) -> StoreResult<()> {
        self.check()
    }

    fn load_script(&mut self, source: &str) -> StoreResult<String> {
        self.check()?;
        let handle = format!("{:08x}", crc32fast::hash(source.as_bytes()));
        self.store
            .inner
            .scripts
            .lock()
            .insert(handle.clone(), source.to_string());
        self.store.inner.script_loads.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn eval_sha(&mut self, handle: &str, keys: &[&str], args: &[String]) -> StoreResult<String> {
        self.check()?;
        if !self.store.inner.scripts.lock().contains_key(handle) {
            return Err(StoreFault::ScriptMissing);
        }
        if MemoryStore::take_injected(&self.store.inner.pending_failures) {
            return Err(StoreFault::Other("ERR injected failure".to_string()));
        }
        self.store.execute(keys, args)
    }
}
