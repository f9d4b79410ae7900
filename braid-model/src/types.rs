//! Strong types for fixed-size byte arrays
//!
//! Semantic newtypes for the byte arrays that flow through the log:
//! content hashes, signer public keys, and signatures. Replaces raw
//! `[u8; N]` so the compiler keeps hashes and keys from being swapped.

use std::fmt;

/// Macro to define fixed-size byte arrays with strong types.
///
/// Args:
/// - $name: the name of the struct (e.g. Hash)
/// - $len: the size of the array (e.g. 32)
/// - $doc: documentation string
/// - $derives: extra traits to derive beyond the common set
macro_rules! byte_newtype {
    ($name:ident, $len:expr, $doc:expr, [$($derives:ident),*]) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy,
            serde::Serialize, serde::Deserialize,
            borsh::BorshSerialize, borsh::BorshDeserialize,
            $($derives),*
        )]
        #[repr(transparent)]
        pub struct $name(#[serde(with = "serde_bytes")] pub [u8; $len]);

        impl $name {
            /// Returns the inner bytes as a fixed-size slice.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Short hex prefix (8 chars) for human-facing rendering.
            pub fn short(&self) -> String {
                let mut s = String::with_capacity(8);
                for byte in &self.0[..4] {
                    s.push_str(&format!("{:02x}", byte));
                }
                s
            }

            /// Parse from a full-length hex string.
            pub fn from_hex(hex_str: &str) -> Result<Self, String> {
                let bytes = hex::decode(hex_str)
                    .map_err(|e| format!("invalid hex: {}", e))?;
                if bytes.len() != $len {
                    return Err(format!(
                        "expected {} hex characters, got {}",
                        $len * 2,
                        hex_str.len()
                    ));
                }
                Ok(Self(bytes.try_into().map_err(|_| "length mismatch".to_string())?))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(wrapper: $name) -> [u8; $len] {
                wrapper.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        // Zero-allocation hex formatting
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(self, f)
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                fmt::Display::fmt(self, f)?;
                write!(f, ")")
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;
            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                Ok(Self(<[u8; $len]>::try_from(slice)?))
            }
        }

        impl TryFrom<Vec<u8>> for $name {
            type Error = Vec<u8>;
            fn try_from(vec: Vec<u8>) -> Result<Self, Self::Error> {
                if vec.len() != $len {
                    return Err(vec);
                }
                let mut arr = [0u8; $len];
                arr.copy_from_slice(&vec);
                Ok(Self(arr))
            }
        }
    };
}

// --- Type definitions ---

byte_newtype!(
    Hash,
    32,
    "32-byte BLAKE3 content address",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Content address of a byte string.
    ///
    /// Every address in braid is the BLAKE3 digest of the bytes it
    /// names: block-store keys, entry identities, and the digest an
    /// entry signature covers all come from here.
    pub fn digest(bytes: &[u8]) -> Hash {
        Hash(*blake3::hash(bytes).as_bytes())
    }
}

byte_newtype!(
    PubKey,
    32,
    "32-byte Ed25519 public key; doubles as a replica identifier",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

byte_newtype!(
    Signature,
    64,
    "64-byte Ed25519 signature",
    [PartialEq, Eq]
);

// --- Tests ---
