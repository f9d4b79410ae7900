//! Block store abstraction
//!
//! The log never touches disk or network itself: every entry lives in an
//! external content-addressed block store reached through this trait.
//! `put` returns the content address that becomes the entry's identity.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Hash;

/// Error from block store operations.
///
/// A missing block is a distinct condition from a failing backend: loaders
/// treat `NotFound` as "stop following this branch" while `Backend`
/// failures propagate to the caller.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("block {0} not found")]
    NotFound(Hash),

    #[error("block of {0} bytes exceeds the maximum entry size")]
    TooLarge(usize),

    #[error("storage backend: {0}")]
    Backend(String),
}

/// Content-addressed block store collaborator.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Persist canonical bytes; the returned hash is their content address.
    async fn put(&self, bytes: Vec<u8>) -> Result<Hash, StorageError>;

    /// Retrieve bytes by content address.
    async fn get(&self, hash: &Hash) -> Result<Vec<u8>, StorageError>;
}
