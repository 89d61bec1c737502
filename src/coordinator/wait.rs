//! Waiting policy for acquire operations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::{LockError, Result};
use crate::protocol::Operation;

/// How long an acquire may keep retrying
///
/// The default waits forever. A deadline turns expiry into
/// [`LockError::Timeout`]; a raised cancel flag into [`LockError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct Wait {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Wait {
    /// Retry until granted
    pub fn forever() -> Self {
        Self::default()
    }

    /// Give up `timeout` from now
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancel: None,
        }
    }

    /// Give up at `deadline`
    pub fn until(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// Also give up once `flag` is set
    pub fn cancel_on(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Error out if cancelled or past the deadline
    pub(crate) fn check(&self, op: Operation, key: &str) -> Result<()> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return Err(LockError::Cancelled {
                op,
                key: key.to_string(),
            });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(LockError::Timeout {
                op,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Shorten a sleep so it ends no later than the deadline
    pub(crate) fn clamp(&self, sleep: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => sleep.min(deadline.saturating_duration_since(Instant::now())),
            None => sleep,
        }
    }
}

/// Randomized sleep between attempts
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    min_ms: u64,
    max_ms: u64,
}

impl Backoff {
    /// Uniform in `min_ms..=max_ms`
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}
