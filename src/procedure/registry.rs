//! Procedure registry
//!
//! Owns the procedure source and its current handle on the store.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::store::{StoreConnection, StoreResult};
use super::LOCK_SCRIPT;

/// Source plus current server-side handle of the lock procedure
///
/// The handle is read before every attempt and replaced wholesale when the
/// procedure is reinstalled, so concurrent callers always see a whole value.
pub struct ProcedureRegistry {
    source: String,
    handle: RwLock<Option<Arc<str>>>,
}

impl ProcedureRegistry {
    /// Registry for the bundled lock procedure
    pub fn new() -> Self {
        Self::with_source(LOCK_SCRIPT)
    }

    /// Registry for a custom procedure honouring the same contract
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            handle: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Current handle, `None` before the first install
    pub fn handle(&self) -> Option<Arc<str>> {
        self.handle.read().clone()
    }

    /// Upload the source and remember the returned handle
    pub fn install<S: StoreConnection + ?Sized>(&self, conn: &mut S) -> StoreResult<Arc<str>> {
        let handle: Arc<str> = conn.load_script(&self.source)?.into();
        tracing::debug!("Lock procedure installed as {}", handle);
        *self.handle.write() = Some(Arc::clone(&handle));
        Ok(handle)
    }
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::new()
    }
}
