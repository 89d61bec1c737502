//! Protocol codec
//!
//! The procedure replies with a JSON document carried in a Redis bulk string.

use crate::error::{LockError, Result};
use super::Response;

/// Upper bound on an accepted reply (64 KB). Replies are a few dozen bytes.
pub const MAX_REPLY_SIZE: usize = 64 * 1024;

/// Decode a procedure reply
pub fn decode_response(payload: &str) -> Result<Response> {
    if payload.len() > MAX_REPLY_SIZE {
        return Err(LockError::Protocol(format!(
            "Reply too large: {} bytes (max {})",
            payload.len(),
            MAX_REPLY_SIZE
        )));
    }

    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(LockError::Protocol("Empty reply".to_string()));
    }

    Ok(serde_json::from_str(trimmed)?)
}

/// Encode a reply the way the procedure does
pub fn encode_response(response: &Response) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}
