//! Response definitions
//!
//! The structured reply of one procedure invocation.

use serde::{Deserialize, Serialize};

/// Reply payload of the lock procedure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Whether the requested transition happened
    #[serde(default)]
    pub op_ret: bool,

    /// Set when the procedure rejects the request outright
    #[serde(default)]
    pub err_msg: String,

    /// Free-form detail, only ever logged
    #[serde(default)]
    pub debug: String,
}

/// What a decoded reply means for the caller's retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Transition applied
    Granted,

    /// Nothing wrong, but no progress possible yet
    Busy,

    /// Procedure reported an error message
    Rejected(String),
}

impl Response {
    /// Create a granted reply
    pub fn granted(debug: impl Into<String>) -> Self {
        Self {
            op_ret: true,
            err_msg: String::new(),
            debug: debug.into(),
        }
    }

    /// Create a busy reply
    pub fn busy(debug: impl Into<String>) -> Self {
        Self {
            op_ret: false,
            err_msg: String::new(),
            debug: debug.into(),
        }
    }

    /// Create a rejected reply
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            op_ret: false,
            err_msg: message.into(),
            debug: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.err_msg.is_empty()
    }

    /// Classify the reply. An error message wins over `op_ret`.
    pub fn outcome(&self) -> Outcome {
        if self.is_error() {
            Outcome::Rejected(self.err_msg.clone())
        } else if self.op_ret {
            Outcome::Granted
        } else {
            Outcome::Busy
        }
    }
}
