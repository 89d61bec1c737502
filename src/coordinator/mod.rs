//! Coordinator Module
//!
//! The public lock operations.
//!
//! ## Responsibilities
//! - Validate requests and normalize leases
//! - Drive the attempt / backoff loop
//! - Interpret procedure replies
//! - Trigger recovery when the store faults
//!
//! ## Retry Shapes
//! ```text
//! acquire-write   unbounded (or until Wait expires), domain error fatal
//! acquire-read    unbounded (or until Wait expires), domain error retried
//! release-write   bounded,  domain error fatal, exhaustion left to lease
//! release-read    bounded,  domain error fatal, exhaustion reported
//! ```

mod guard;
mod service;
mod wait;

pub use guard::{ReadGuard, WriteGuard};
pub use service::LockService;
pub use wait::{Backoff, Wait};
