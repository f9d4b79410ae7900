use braid_model::{Hash, PubKey, StorageError};
use thiserror::Error;

/// Errors from log operations
///
/// Authorization and validation failures abort the enclosing operation
/// with no mutation of log state. Storage failures propagate unchanged
/// from the block store.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("append denied for author {0}")]
    AppendDenied(PubKey),

    #[error("join denied: access controller rejected entry {0}")]
    JoinDenied(Hash),

    #[error("invalid signature on entry {0}")]
    SignatureInvalid(Hash),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("entry decode failed: {0}")]
    Decode(String),

    #[error("inconsistent preload: {0}")]
    InvalidHeads(&'static str),
}
