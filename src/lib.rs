//! # rwlock-redis
//!
//! A distributed read-write lock. Independent processes agree on exclusive
//! write access and shared read access to a named resource through one
//! shared store, with:
//! - Atomic state transitions executed server-side by a Lua procedure
//! - Leases that end abandoned write locks on their own
//! - Blocking acquisition with randomized backoff, optionally bounded
//! - Transparent recovery from dropped connections and evicted procedures
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LockService                             │
//! │     acquire/release write, acquire/release read, guards      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one attempt = one round trip
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Protocol   │          │  Procedure  │
//!   │ (JSON reply)│          │  Registry   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌──────────────┐
//!                           │    Store     │
//!                           │ Redis/Memory │
//!                           └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use redis_rwlock::{Config, LockService};
//!
//! let service = LockService::open(Config::builder().url("redis://127.0.0.1/").build())?;
//! service.acquire_write("inventory:42", "orderA", 5)?;
//! // ... exclusive section ...
//! service.release_write("inventory:42", "orderA")?;
//! # Ok::<(), redis_rwlock::LockError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod store;
pub mod procedure;
pub mod coordinator;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LockError, Result};
pub use config::{Config, ConnectionOptions};
pub use coordinator::{LockService, ReadGuard, Wait, WriteGuard};
pub use store::{MemoryStore, StoreFault};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rwlock-redis
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
