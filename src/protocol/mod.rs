//! Protocol Module
//!
//! Defines the contract for a single invocation of the lock procedure.
//!
//! ## Invocation
//! ```text
//! EVALSHA <handle> 2 <resource key> <operation> [args...]
//!
//! LOCK     args: holder id, lease seconds
//! UNLOCK   args: holder id
//! RLOCK    args: none
//! RUNLOCK  args: none
//! ```
//!
//! ## Reply
//! A single JSON string:
//! ```text
//! {"opRet": true|false, "errMsg": "...", "debug": "..."}
//! ```
//!
//! ### Decoding
//! - non-empty `errMsg`: domain error, whatever `opRet` says
//! - `opRet == true`: the transition happened
//! - `opRet == false`: no progress possible right now, retry

mod command;
mod response;
mod codec;

pub use command::{Command, Operation, MAX_LEASE_SECS};
pub use response::{Outcome, Response};
pub use codec::{decode_response, encode_response};
