//! In-memory content-addressed block store
//!
//! The reference [`BlockStore`] used by tests and examples. Blocks are
//! keyed by the BLAKE3 hash of their bytes, so `put` is idempotent and
//! `get` can never return bytes that do not match their address.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use braid_model::{BlockStore, Hash, StorageError};

use crate::MAX_ENTRY_SIZE;

/// Shared in-process block store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blocks held.
    pub async fn len(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blocks.read().await.is_empty()
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<Hash, StorageError> {
        if bytes.len() > MAX_ENTRY_SIZE {
            return Err(StorageError::TooLarge(bytes.len()));
        }
        let hash = Hash::digest(&bytes);
        self.blocks.write().await.insert(hash, bytes);
        Ok(hash)
    }

    async fn get(&self, hash: &Hash) -> Result<Vec<u8>, StorageError> {
        self.blocks
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or(StorageError::NotFound(*hash))
    }
}
