//! Store Module
//!
//! The boundary to the shared atomic store.
//!
//! ## Responsibilities
//! - Open connections from retained options (`Connector`)
//! - Run one round trip per call: ping, script load, script call
//! - Translate every low-level failure into a closed `StoreFault`
//!
//! Two stores ship with the crate: Redis (single node, Sentinel failover,
//! cluster) and a process-local `MemoryStore` with fault injection.

mod fault;
mod memory;
mod redis_store;

pub use fault::{Recovery, StoreFault, StoreResult};
pub use memory::{MemoryConnection, MemoryStore};
pub use redis_store::{RedisConnection, RedisConnector};

/// One live connection to the store
pub trait StoreConnection: Send {
    /// Liveness probe
    fn ping(&mut self) -> StoreResult<()>;

    /// Install a procedure, returning its handle
    fn load_script(&mut self, source: &str) -> StoreResult<String>;

    /// Invoke an installed procedure, returning its string reply
    fn eval_sha(&mut self, handle: &str, keys: &[&str], args: &[String]) -> StoreResult<String>;
}

/// Builds connections from options captured at construction
pub trait Connector: Send + Sync {
    type Connection: StoreConnection;

    /// Open a fresh connection
    fn connect(&self) -> StoreResult<Self::Connection>;

    /// Human readable target, for logs
    fn describe(&self) -> String;
}
