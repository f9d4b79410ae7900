//! Braid Core
//!
//! A replicated, append-only, content-addressed log that converges as a
//! CRDT: independent replicas accept local appends, exchange signed
//! entries out of order, and, given the same observed entry set, derive
//! the same totally ordered sequence without coordination.
//!
//! - **Entry**: immutable signed node referencing predecessors by hash
//! - **Log**: the indices, append, and join (merge) machinery
//! - **order**: the deterministic last-write-wins total order
//! - **traverse**: priority-ordered DAG walk shared by all consumers
//! - **load**: reconstruction of logs from a block store
//! - **MemoryStore**: reference in-memory block store
//!
//! Persistence, access policy, and identity are collaborator traits from
//! `braid-model`; the log never performs I/O beyond them.

pub mod entry;
pub mod error;
pub mod load;
pub mod log;
pub mod memstore;
pub mod order;
pub mod traverse;

/// Maximum size of an encoded entry (16 MB)
pub const MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024;

pub use entry::{Entry, EntryBody};
pub use error::LogError;
pub use load::{from_entry, from_entry_hash, from_json, from_multihash};
pub use log::{JoinOutcome, Log, LogJson, LogOptions, LogSnapshot};
pub use memstore::MemoryStore;
pub use order::last_write_wins;
pub use traverse::traverse;
