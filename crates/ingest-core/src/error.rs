//! Error types module
//!
//! Decoding errors for inbound messages. Storage and broker errors live in their
//! own crates; startup failures are reported through `anyhow` at the binary.

use thiserror::Error;

/// Why an inbound message body could not be turned into an upload request.
///
/// Every variant is a per-message failure: the message is dropped and the
/// consume loop moves on.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed message body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upload request {id} has an empty file name")]
    MissingName { id: u64 },
}
