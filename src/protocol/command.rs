//! Command definitions
//!
//! Represents one requested lock transition and how it is laid out as
//! procedure keys and arguments.

use std::fmt;
use std::str::FromStr;

use crate::error::LockError;

/// Longest lease the procedure accepts, one year in seconds
pub const MAX_LEASE_SECS: i64 = 365 * 24 * 60 * 60;

/// Operation names understood by the lock procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Lock,
    Unlock,
    RLock,
    RUnlock,
}

impl Operation {
    /// Wire name passed as the second procedure key
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Lock => "LOCK",
            Operation::Unlock => "UNLOCK",
            Operation::RLock => "RLOCK",
            Operation::RUnlock => "RUNLOCK",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCK" => Ok(Operation::Lock),
            "UNLOCK" => Ok(Operation::Unlock),
            "RLOCK" => Ok(Operation::RLock),
            "RUNLOCK" => Ok(Operation::RUnlock),
            other => Err(LockError::Protocol(format!("Unknown operation: {}", other))),
        }
    }
}

/// A requested lock transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Acquire the write lock for `holder` with a lease
    Lock {
        key: String,
        holder: String,
        lease_secs: i64,
    },

    /// Release the write lock held by `holder`
    Unlock { key: String, holder: String },

    /// Take a read share
    RLock { key: String },

    /// Return a read share
    RUnlock { key: String },
}

impl Command {
    /// Get the operation
    pub fn operation(&self) -> Operation {
        match self {
            Command::Lock { .. } => Operation::Lock,
            Command::Unlock { .. } => Operation::Unlock,
            Command::RLock { .. } => Operation::RLock,
            Command::RUnlock { .. } => Operation::RUnlock,
        }
    }

    /// Resource key the command targets
    pub fn key(&self) -> &str {
        match self {
            Command::Lock { key, .. }
            | Command::Unlock { key, .. }
            | Command::RLock { key }
            | Command::RUnlock { key } => key,
        }
    }

    /// Procedure keys: resource key, operation name
    ///
    /// The operation name hashes to its own slot, so under Redis Cluster the
    /// pair is usually cross-slot. See `ConnectionOptions::Cluster`.
    pub fn keys(&self) -> [&str; 2] {
        [self.key(), self.operation().as_str()]
    }

    /// Positional procedure arguments
    pub fn args(&self) -> Vec<String> {
        match self {
            Command::Lock {
                holder, lease_secs, ..
            } => vec![holder.clone(), lease_secs.to_string()],
            Command::Unlock { holder, .. } => vec![holder.clone()],
            Command::RLock { .. } | Command::RUnlock { .. } => Vec::new(),
        }
    }
}
