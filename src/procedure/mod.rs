//! Procedure Module
//!
//! The server-side lock procedure and the registry that keeps its handle.
//!
//! ## Lock Record
//! One hash per resource key:
//! ```text
//! <resource key>
//!   ├── writer   holder id of the exclusive writer (absent when none)
//!   └── readers  live read shares (absent when zero)
//! ```
//! A writer sets a TTL on the whole key (the lease). Writers and readers
//! exclude each other inside the procedure, so a key never has both.

mod registry;

pub use registry::ProcedureRegistry;

/// Lua source of the lock procedure
pub const LOCK_SCRIPT: &str = include_str!("rwlock.lua");
