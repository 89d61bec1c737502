//! Store fault classification
//!
//! Every failure of a store round trip is one of three kinds, each with a
//! fixed recovery action.

use thiserror::Error;

/// Result type for store round trips
pub type StoreResult<T> = std::result::Result<T, StoreFault>;

/// A failed round trip to the store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreFault {
    /// Connection reset, end of stream, refused or timed out
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The store does not know the procedure handle
    #[error("lock procedure not loaded on store")]
    ScriptMissing,

    /// Anything else the store reported
    #[error("{0}")]
    Other(String),
}

/// What to do about a fault before the next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Rebuild the connection, probe it, reinstall the procedure
    Reconnect,

    /// Reinstall the procedure on the current connection
    Reinstall,

    /// Nothing; the caller just retries
    None,
}

impl StoreFault {
    pub fn recovery(&self) -> Recovery {
        match self {
            StoreFault::ConnectionLost(_) => Recovery::Reconnect,
            StoreFault::ScriptMissing => Recovery::Reinstall,
            StoreFault::Other(_) => Recovery::None,
        }
    }
}
