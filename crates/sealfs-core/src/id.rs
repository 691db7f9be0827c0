//! Fixed-length identities addressing blobs in the chunk store.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use sha2::{Digest, Sha512};

/// Byte length of every identity in the store.
pub const ID_LEN: usize = 64;

/// An opaque 64-byte identity.
///
/// Identities name everything the chunk store holds: encrypted chunks,
/// directory envelopes, and the bootstrap blobs. A directory's identity is
/// generated uniformly at random on creation and is stable for the life of
/// the directory.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(#[serde_as(as = "Base64")] [u8; ID_LEN]);

/// Identity of a directory listing; also its key in the chunk store.
pub type DirectoryId = ObjectId;

impl ObjectId {
    /// A fresh random identity.
    pub fn random() -> Self {
        let mut bytes = [0u8; ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        ObjectId(bytes)
    }

    /// The SHA-512 digest of `input`, as an identity.
    ///
    /// Used for the deterministic bootstrap keys and for content addressing
    /// of encrypted chunks.
    pub fn from_digest(input: &[u8]) -> Self {
        let digest = Sha512::digest(input);
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&digest);
        ObjectId(bytes)
    }

    /// The SHA-512 digest over a sequence of inputs, length-prefixed so that
    /// `["ab", "c"]` and `["a", "bc"]` hash differently.
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha512::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        ObjectId(bytes)
    }

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        ObjectId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Lowercase hex of the full identity, usable as a file name.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(ID_LEN * 2);
        for byte in &self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight bytes are plenty to tell identities apart in logs.
        write!(
            f,
            "ObjectId({:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], self.0[6], self.0[7]
        )
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
