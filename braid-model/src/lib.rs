//! Braid Model
//!
//! Pure data types and collaborator traits for the braid replicated log,
//! decoupled from the log machinery itself:
//! - **Hash / PubKey / Signature**: strong byte-array types; `Hash::digest`
//!   is the content-addressing primitive
//! - **LamportClock**: logical `(id, time)` timestamp with a total order
//! - **Keypair / IdentityProvider**: Ed25519 signer identity, keyfile
//!   persistence, and strict verification
//! - **AccessController**: write-authorization collaborator
//! - **BlockStore**: content-addressed persistence collaborator
//! - **Clock**: wall-time abstraction for testability

pub mod access;
pub mod clock;
pub mod identity;
pub mod lamport;
pub mod storage;
pub mod types;

pub use access::{AccessController, AllowAll, AuthorAllowList};
pub use clock::{Clock, MockClock, SystemClock};
pub use identity::{Ed25519Provider, IdentityError, IdentityProvider, Keypair, VerifyError};
pub use lamport::LamportClock;
pub use storage::{BlockStore, StorageError};
pub use types::{Hash, PubKey, Signature};
