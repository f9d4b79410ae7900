//! Log entries: immutable signed nodes of the DAG
//!
//! An [`EntryBody`] is the unsigned content; its Borsh field order is the
//! canonical serialization order, so `blake3(borsh(body))` is the digest
//! that gets signed. The stored form is the body plus its signature; the
//! block store's content address of those bytes becomes the entry's
//! identity and the value other entries reference in `next`.
//!
//! Entries are created exactly once (local append or ingestion during a
//! join) and never mutated. Predecessor hashes are kept sorted and
//! deduplicated so the canonical bytes are stable across replicas.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use braid_model::{
    BlockStore, Hash, IdentityProvider, Keypair, LamportClock, PubKey, Signature, StorageError,
    VerifyError,
};

use crate::error::LogError;
use crate::MAX_ENTRY_SIZE;

/// The unsigned body of an entry.
///
/// Field order matches the canonical Borsh serialization order.
#[derive(
    Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct EntryBody {
    /// Identifier of the log this entry belongs to.
    pub log_id: String,
    /// Opaque application payload.
    pub payload: Vec<u8>,
    /// Predecessor hashes: sorted lexically, no duplicates.
    pub next: Vec<Hash>,
    /// Lamport clock captured at creation.
    pub clock: LamportClock,
    /// The signer's public key.
    pub author: PubKey,
}

impl EntryBody {
    /// The canonical content digest: `blake3(borsh(self))`.
    ///
    /// This is what gets signed. Note it is distinct from the entry's
    /// identity hash, which covers the signature as well.
    pub fn content_hash(&self) -> Hash {
        let bytes = borsh::to_vec(self).expect("borsh serialization cannot fail");
        Hash::digest(&bytes)
    }
}

/// Stored form: body plus proof. These are the bytes the block store keeps.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
struct SignedRecord {
    body: EntryBody,
    sig: Signature,
}

/// An immutable, signed, content-addressed log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    body: EntryBody,
    sig: Signature,
    hash: Hash,
}

impl Entry {
    /// Build, sign, and persist a new entry.
    ///
    /// Predecessors are canonicalized (sorted, deduplicated) before
    /// signing. The returned entry carries the block store's content
    /// address as its identity. Signing and storage failures surface to
    /// the caller; nothing else holds a reference to the entry yet, so
    /// no partial log state can remain.
    pub async fn create(
        store: &dyn BlockStore,
        keypair: &Keypair,
        log_id: &str,
        payload: Vec<u8>,
        next: Vec<Hash>,
        clock: LamportClock,
    ) -> Result<Entry, LogError> {
        let body = EntryBody {
            log_id: log_id.to_owned(),
            payload,
            next: canonical_next(next),
            clock,
            author: keypair.public_key(),
        };

        let sig = keypair.sign(&body.content_hash());
        let record = SignedRecord { body, sig };
        let bytes = borsh::to_vec(&record).expect("borsh serialization cannot fail");
        if bytes.len() > MAX_ENTRY_SIZE {
            return Err(LogError::Storage(StorageError::TooLarge(bytes.len())));
        }

        let hash = store.put(bytes).await?;
        Ok(Entry {
            body: record.body,
            sig: record.sig,
            hash,
        })
    }

    /// Reconstruct an entry from stored bytes and the content address
    /// they were retrieved under.
    pub fn decode(hash: Hash, bytes: &[u8]) -> Result<Entry, LogError> {
        if bytes.len() > MAX_ENTRY_SIZE {
            return Err(LogError::Storage(StorageError::TooLarge(bytes.len())));
        }
        let record: SignedRecord =
            borsh::from_slice(bytes).map_err(|e| LogError::Decode(e.to_string()))?;
        Ok(Entry {
            body: record.body,
            sig: record.sig,
            hash,
        })
    }

    /// Canonical stored bytes of this entry.
    pub fn encode(&self) -> Vec<u8> {
        let record = SignedRecord {
            body: self.body.clone(),
            sig: self.sig,
        };
        borsh::to_vec(&record).expect("borsh serialization cannot fail")
    }

    /// Verify the signature against the recomputed body digest.
    pub fn verify(&self, provider: &dyn IdentityProvider) -> Result<(), VerifyError> {
        provider.verify(&self.body.author, &self.body.content_hash(), &self.sig)
    }

    /// Content address; the entry's identity.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Identifier of the log this entry belongs to.
    pub fn log_id(&self) -> &str {
        &self.body.log_id
    }

    /// Application payload.
    pub fn payload(&self) -> &[u8] {
        &self.body.payload
    }

    /// Predecessor hashes (sorted, unique).
    pub fn next(&self) -> &[Hash] {
        &self.body.next
    }

    /// Lamport clock captured at creation.
    pub fn clock(&self) -> LamportClock {
        self.body.clock
    }

    /// The signer's public key.
    pub fn author(&self) -> PubKey {
        self.body.author
    }

    /// Signature over the body digest.
    pub fn sig(&self) -> &Signature {
        &self.sig
    }

    /// Whether this entry references `hash` as a predecessor.
    pub fn references(&self, hash: &Hash) -> bool {
        self.body.next.binary_search(hash).is_ok()
    }
}

/// Sort and deduplicate a predecessor set into canonical form.
fn canonical_next(mut next: Vec<Hash>) -> Vec<Hash> {
    next.sort();
    next.dedup();
    next
}
