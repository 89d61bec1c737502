//! Error types for the lock service
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::protocol::Operation;
use crate::store::StoreFault;

/// Result type alias using LockError
pub type Result<T> = std::result::Result<T, LockError>;

/// Unified error type for lock operations
#[derive(Debug, Error)]
pub enum LockError {
    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("{op}: lock key is empty")]
    EmptyKey { op: Operation },

    // -------------------------------------------------------------------------
    // Domain Errors (reported by the store procedure)
    // -------------------------------------------------------------------------
    #[error("{op} on '{key}' rejected by lock procedure: {message}")]
    Domain {
        op: Operation,
        key: String,
        message: String,
    },

    #[error("{op} on '{key}' not confirmed after {attempts} attempts")]
    ReleaseUnconfirmed {
        op: Operation,
        key: String,
        attempts: u32,
    },

    // -------------------------------------------------------------------------
    // Waiting
    // -------------------------------------------------------------------------
    #[error("{op} on '{key}' timed out")]
    Timeout { op: Operation, key: String },

    #[error("{op} on '{key}' was cancelled")]
    Cancelled { op: Operation, key: String },

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Store error: {0}")]
    Store(#[from] StoreFault),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LockError {
    /// True for errors the caller caused (empty key, rejected request)
    pub fn is_usage(&self) -> bool {
        matches!(self, LockError::EmptyKey { .. } | LockError::Domain { .. })
    }
}
