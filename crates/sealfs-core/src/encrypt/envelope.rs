//! Position-bound encryption of a directory's data map.
//!
//! The stored blob under a directory's id is
//! `sign(encrypt(parent_id, directory_id, data_map))`: a deterministic
//! AES-SIV layer keyed from the (parent, directory) identity pair with both
//! ids as associated data, wrapped in an owner-signed envelope. Decryption
//! under any other parent fails authentication, which is what makes moving a
//! directory across parents a re-seal rather than a pointer update.

use aes_siv::siv::Aes256Siv;
use aes_siv::KeyInit;
use ring::signature::{Ed25519KeyPair, UnparsedPublicKey, ED25519};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

use crate::encrypt::data_map::DataMap;
use crate::error::{DriveError, Result};
use crate::id::{DirectoryId, ObjectId};

/// Domain separator for envelope key derivation.
const ENVELOPE_KEY_DOMAIN: &[u8] = b"sealfs.directory.envelope.v1";

/// Derive the 64-byte SIV key binding a listing to its tree position.
fn envelope_key(parent_id: &DirectoryId, directory_id: &DirectoryId) -> [u8; 64] {
    *ObjectId::from_parts(&[
        ENVELOPE_KEY_DOMAIN,
        parent_id.as_bytes(),
        directory_id.as_bytes(),
    ])
    .as_bytes()
}

/// Encrypt a directory's data map, bound to `(parent_id, directory_id)`.
pub fn encrypt_data_map(
    parent_id: &DirectoryId,
    directory_id: &DirectoryId,
    data_map: &DataMap,
) -> Result<Vec<u8>> {
    let key = envelope_key(parent_id, directory_id);
    let mut cipher = Aes256Siv::new_from_slice(&key)
        .map_err(|_| DriveError::IoFailure("envelope key rejected".into()))?;
    let associated: [&[u8]; 2] = [parent_id.as_bytes(), directory_id.as_bytes()];
    cipher
        .encrypt(&associated, &data_map.serialise()?)
        .map_err(|_| DriveError::IoFailure("envelope encryption failed".into()))
}

/// Decrypt a directory's data map; fails unless `(parent_id, directory_id)`
/// match the pair the envelope was sealed under.
pub fn decrypt_data_map(
    parent_id: &DirectoryId,
    directory_id: &DirectoryId,
    ciphertext: &[u8],
) -> Result<DataMap> {
    let key = envelope_key(parent_id, directory_id);
    let mut cipher = Aes256Siv::new_from_slice(&key)
        .map_err(|_| DriveError::IoFailure("envelope key rejected".into()))?;
    let associated: [&[u8]; 2] = [parent_id.as_bytes(), directory_id.as_bytes()];
    let plain = cipher.decrypt(&associated, &ciphertext).map_err(|_| {
        DriveError::IoFailure(format!(
            "directory envelope for {directory_id} failed authentication"
        ))
    })?;
    DataMap::parse(&plain)
}

/// Signed wrapper carrying the encrypted data map of a directory listing.
#[serde_as]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDirectory {
    #[serde_as(as = "Base64")]
    encrypted_data_map: Vec<u8>,
    #[serde_as(as = "Base64")]
    signature: Vec<u8>,
}

impl OwnerDirectory {
    /// Wrap an encrypted data map, signing it with the owner key.
    pub fn seal(encrypted_data_map: Vec<u8>, owner_key: &Ed25519KeyPair) -> Self {
        let signature = owner_key.sign(&encrypted_data_map).as_ref().to_vec();
        OwnerDirectory {
            encrypted_data_map,
            signature,
        }
    }

    /// Verify the owner signature and return the encrypted data map.
    pub fn verify_and_open(self, owner_public_key: &[u8]) -> Result<Vec<u8>> {
        UnparsedPublicKey::new(&ED25519, owner_public_key)
            .verify(&self.encrypted_data_map, &self.signature)
            .map_err(|_| DriveError::IoFailure("owner signature verification failed".into()))?;
        Ok(self.encrypted_data_map)
    }

    pub fn serialise(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|err| DriveError::IoFailure(format!("serialise owner directory: {err}")))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|err| DriveError::IoFailure(format!("parse owner directory: {err}")))
    }
}
