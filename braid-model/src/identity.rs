//! Signer identity, signatures, and key persistence
//!
//! Each replica signs its entries with an Ed25519 keypair. The public
//! key is the replica's identity and its Lamport clock id; the private
//! key never leaves the local keyfile.
//!
//! Signatures cover a 32-byte content digest, never raw entry bytes:
//! callers hash first ([`crate::Hash::digest`]), then sign the digest.
//! Verification is strict (small-order keys and non-canonical S are
//! rejected), since every entry ingested from another replica passes
//! through it.
//!
//! # Keyfile format
//!
//! A keyfile is a single line of text:
//!
//! ```text
//! braid-key-v1:<64 lowercase hex chars>
//! ```
//!
//! Hex keeps the file inspectable and diff-friendly, and the version
//! prefix refuses raw or foreign key material instead of silently
//! interpreting it. Key bytes are zeroized on every load and save path.

use std::fs;
use std::io;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::types::{Hash, PubKey, Signature};

/// Version prefix every braid keyfile starts with.
const KEYFILE_PREFIX: &str = "braid-key-v1:";

/// Errors from keypair persistence
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("key file is not a braid-key-v1 file")]
    MalformedKeyFile,

    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Why a signature was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("signature does not match the digest")]
    BadSignature,

    #[error("author bytes are not a valid Ed25519 public key")]
    BadPublicKey,
}

/// The local signer for a log replica.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new identity with a random keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create an identity from an existing signing key.
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Load an identity from a keyfile, generating and saving a fresh
    /// one when the file does not exist. Returns `(keypair, is_new)`.
    ///
    /// Only a missing file triggers generation; a present-but-malformed
    /// keyfile is an error, never silently replaced.
    pub fn load_or_generate(path: impl AsRef<Path>) -> Result<(Self, bool), IdentityError> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(keypair) => Ok((keypair, false)),
            Err(IdentityError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                let keypair = Self::generate();
                keypair.save(path)?;
                Ok((keypair, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Load an identity from a `braid-key-v1` keyfile.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let text = Zeroizing::new(fs::read_to_string(path)?);

        let hex_part = text
            .trim()
            .strip_prefix(KEYFILE_PREFIX)
            .ok_or(IdentityError::MalformedKeyFile)?;
        let decoded = Zeroizing::new(
            hex::decode(hex_part).map_err(|_| IdentityError::MalformedKeyFile)?,
        );
        if decoded.len() != 32 {
            return Err(IdentityError::InvalidKeyLength(decoded.len()));
        }

        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&decoded);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// Write the private key to a `braid-key-v1` keyfile.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IdentityError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let secret = Zeroizing::new(self.signing_key.to_bytes());
        let line = Zeroizing::new(format!("{KEYFILE_PREFIX}{}\n", hex::encode(&*secret)));
        fs::write(path, line.as_bytes())?;
        Ok(())
    }

    /// The public half of the keypair: this replica's identity.
    pub fn public_key(&self) -> PubKey {
        PubKey::from(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a content digest.
    pub fn sign(&self, digest: &Hash) -> Signature {
        Signature(self.signing_key.sign(digest.as_bytes()).to_bytes())
    }
}

// ---------------------------------------------------------------------------
// IdentityProvider
// ---------------------------------------------------------------------------

/// Verification handle passed opaquely through the log to access
/// controllers and signature gates.
///
/// Object-safe so it can travel as `&dyn IdentityProvider`.
pub trait IdentityProvider: Send + Sync {
    /// Verify that `sig` over `digest` was produced by `author`.
    fn verify(&self, author: &PubKey, digest: &Hash, sig: &Signature) -> Result<(), VerifyError>;
}

/// The canonical provider: strict Ed25519 verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Provider;

impl IdentityProvider for Ed25519Provider {
    fn verify(&self, author: &PubKey, digest: &Hash, sig: &Signature) -> Result<(), VerifyError> {
        let key = VerifyingKey::from_bytes(author.as_bytes())
            .map_err(|_| VerifyError::BadPublicKey)?;
        let sig = ed25519_dalek::Signature::from_bytes(sig.as_bytes());
        key.verify_strict(digest.as_bytes(), &sig)
            .map_err(|_| VerifyError::BadSignature)
    }
}
