//! Session identifier resolution.
//!
//! A session id is an opaque correlation key owned by the client. It is
//! passed unchanged to the agent graph as the thread id, and echoed back in
//! every response so the caller can resume the same conversation thread.

use uuid::Uuid;

/// Return the caller-supplied session id when present and non-empty,
/// otherwise generate a fresh random one.
///
/// No uniqueness check against existing sessions is performed; a UUIDv4
/// collision is treated as negligible.
#[must_use]
pub fn resolve(supplied: Option<&str>) -> String {
    match supplied {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}
