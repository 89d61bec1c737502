//! Scoped lock handles
//!
//! A guard releases its lock when dropped. Drop cannot report failure, so
//! callers that care call `release()` and handle the result.

use crate::error::Result;
use crate::store::Connector;
use super::LockService;

/// Held write lock
#[must_use = "dropping the guard releases the lock immediately"]
pub struct WriteGuard<'a, C: Connector> {
    service: &'a LockService<C>,
    key: String,
    holder: String,
    released: bool,
}

impl<'a, C: Connector> WriteGuard<'a, C> {
    pub(crate) fn new(service: &'a LockService<C>, key: &str, holder: &str) -> Self {
        Self {
            service,
            key: key.to_string(),
            holder: holder.to_string(),
            released: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Release now and report the outcome
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.service.release_write(&self.key, &self.holder)
    }
}

impl<C: Connector> Drop for WriteGuard<'_, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.service.release_write(&self.key, &self.holder) {
            tracing::warn!("Dropped write guard on '{}' failed to release: {}", self.key, e);
        }
    }
}

/// Held read share
#[must_use = "dropping the guard releases the lock immediately"]
pub struct ReadGuard<'a, C: Connector> {
    service: &'a LockService<C>,
    key: String,
    released: bool,
}

impl<'a, C: Connector> ReadGuard<'a, C> {
    pub(crate) fn new(service: &'a LockService<C>, key: &str) -> Self {
        Self {
            service,
            key: key.to_string(),
            released: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release now and report the outcome
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.service.release_read(&self.key)
    }
}

impl<C: Connector> Drop for ReadGuard<'_, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.service.release_read(&self.key) {
            tracing::warn!("Dropped read guard on '{}' failed to release: {}", self.key, e);
        }
    }
}
