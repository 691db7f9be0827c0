//! The bootstrap session: how three user secrets become a drive.
//!
//! On first mount a random user identity, root-parent identity and owner
//! signing key are minted and sealed into a *TMID* blob under a key derived
//! from the password. A *MID* blob, stored under a key deterministic in
//! (keyword, pin), carries an encrypted pointer to the TMID's name. On later
//! mounts the same two secrets locate the MID, the pointer is decrypted, and
//! the password unseals the session — so the drive's entire root chain is
//! recoverable from nothing but the three secrets.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use aes_siv::siv::Aes256Siv;
use rand::RngCore;
use ring::signature::{Ed25519KeyPair, KeyPair};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use zeroize::Zeroizing;

use crate::error::{DriveError, Result};
use crate::id::{ObjectId, ID_LEN};

/// Default scrypt cost parameter (N = 2^15), matching common vault formats.
const DEFAULT_SCRYPT_COST_LOG2: u8 = 15;
/// Weak cost parameter for tests; enable with `SEALFS_FAST_KDF=1`.
const FAST_SCRYPT_COST_LOG2: u8 = 10;
const SCRYPT_BLOCK_SIZE: u32 = 8;
const SCRYPT_PARALLELIZATION: u32 = 1;

const MID_KEY_DOMAIN: &[u8] = b"sealfs.mid.v1";
const TMID_KEY_DOMAIN: &[u8] = b"sealfs.tmid.v1";
const TMID_POINTER_DOMAIN: &[u8] = b"sealfs.tmid-pointer.v1";
const SESSION_SALT_DOMAIN: &[u8] = b"sealfs.session-salt.v1";

/// Whether the weak test-only KDF parameters are enabled.
///
/// Never set `SEALFS_FAST_KDF` outside of tests: it cuts the scrypt cost by
/// roughly 32x.
fn is_fast_kdf_enabled() -> bool {
    std::env::var("SEALFS_FAST_KDF")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn scrypt_cost_log2() -> u8 {
    if is_fast_kdf_enabled() {
        FAST_SCRYPT_COST_LOG2
    } else {
        DEFAULT_SCRYPT_COST_LOG2
    }
}

/// The three mount secrets.
///
/// Held behind [`SecretString`] so the values never land in debug output;
/// key material derived from them is zeroized on drop.
pub struct UserCredentials {
    keyword: SecretString,
    pin: SecretString,
    password: SecretString,
}

impl UserCredentials {
    pub fn new(
        keyword: impl Into<String>,
        pin: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        UserCredentials {
            keyword: SecretString::from(keyword.into()),
            pin: SecretString::from(pin.into()),
            password: SecretString::from(password.into()),
        }
    }

    fn keyword(&self) -> &[u8] {
        self.keyword.expose_secret().as_bytes()
    }

    fn pin(&self) -> &[u8] {
        self.pin.expose_secret().as_bytes()
    }

    fn password(&self) -> &[u8] {
        self.password.expose_secret().as_bytes()
    }
}

/// The record sealed inside the TMID.
#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    unique_user_id: ObjectId,
    root_parent_id: ObjectId,
    #[serde_as(as = "Base64")]
    owner_key_pkcs8: Vec<u8>,
    #[serde_as(as = "Base64")]
    owner_public_key: Vec<u8>,
}

impl Session {
    /// Mint a fresh session: random identities plus a new owner keypair.
    pub fn create() -> Result<Self> {
        let rng = ring::rand::SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| DriveError::Uninitialised("owner key generation failed".into()))?;
        let key = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|_| DriveError::Uninitialised("owner key rejected".into()))?;
        Ok(Session {
            unique_user_id: ObjectId::random(),
            root_parent_id: ObjectId::random(),
            owner_key_pkcs8: pkcs8.as_ref().to_vec(),
            owner_public_key: key.public_key().as_ref().to_vec(),
        })
    }

    pub fn unique_user_id(&self) -> &ObjectId {
        &self.unique_user_id
    }

    pub fn root_parent_id(&self) -> &ObjectId {
        &self.root_parent_id
    }

    pub fn owner_public_key(&self) -> &[u8] {
        &self.owner_public_key
    }

    /// Reconstruct the owner signing key from its stored form.
    pub fn owner_key(&self) -> Result<Ed25519KeyPair> {
        Ed25519KeyPair::from_pkcs8(&self.owner_key_pkcs8)
            .map_err(|_| DriveError::InvalidCredentials)
    }

    pub fn serialise(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|err| DriveError::IoFailure(format!("serialise session: {err}")))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|_| DriveError::InvalidCredentials)
    }
}

/// Deterministic chunk-store key of the MID blob.
pub fn mid_key(credentials: &UserCredentials) -> ObjectId {
    ObjectId::from_parts(&[MID_KEY_DOMAIN, credentials.keyword(), credentials.pin()])
}

/// Deterministic chunk-store key of the TMID blob for a given TMID name.
pub fn tmid_key(credentials: &UserCredentials, tmid_name: &ObjectId) -> ObjectId {
    ObjectId::from_parts(&[
        TMID_KEY_DOMAIN,
        credentials.keyword(),
        credentials.pin(),
        tmid_name.as_bytes(),
    ])
}

/// SIV key under which the MID's pointer to the TMID name is sealed.
fn pointer_key(credentials: &UserCredentials) -> Zeroizing<[u8; 64]> {
    Zeroizing::new(
        *ObjectId::from_parts(&[
            TMID_POINTER_DOMAIN,
            credentials.keyword(),
            credentials.pin(),
        ])
        .as_bytes(),
    )
}

/// Seal the random TMID name into the MID payload.
pub fn encrypt_tmid_pointer(
    credentials: &UserCredentials,
    tmid_name: &ObjectId,
) -> Result<Vec<u8>> {
    let key = pointer_key(credentials);
    let mut cipher = Aes256Siv::new_from_slice(key.as_ref())
        .map_err(|_| DriveError::IoFailure("pointer key rejected".into()))?;
    let associated: [&[u8]; 0] = [];
    cipher
        .encrypt(&associated, tmid_name.as_bytes())
        .map_err(|_| DriveError::IoFailure("pointer encryption failed".into()))
}

/// Recover the TMID name from the MID payload.
pub fn decrypt_tmid_pointer(
    credentials: &UserCredentials,
    ciphertext: &[u8],
) -> Result<ObjectId> {
    let key = pointer_key(credentials);
    let mut cipher = Aes256Siv::new_from_slice(key.as_ref())
        .map_err(|_| DriveError::IoFailure("pointer key rejected".into()))?;
    let associated: [&[u8]; 0] = [];
    let plain = cipher
        .decrypt(&associated, &ciphertext)
        .map_err(|_| DriveError::InvalidCredentials)?;
    let bytes: [u8; ID_LEN] = plain
        .as_slice()
        .try_into()
        .map_err(|_| DriveError::InvalidCredentials)?;
    Ok(ObjectId::from_bytes(bytes))
}

/// The on-store form of the sealed session.
#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SealedSession {
    #[serde_as(as = "Base64")]
    nonce: [u8; 12],
    #[serde_as(as = "Base64")]
    ciphertext: Vec<u8>,
}

/// Password-derived key-encryption key. The salt is deterministic in
/// (keyword, pin) so the same three secrets always reproduce it.
fn derive_session_kek(credentials: &UserCredentials) -> Result<Zeroizing<[u8; 32]>> {
    let salt = ObjectId::from_parts(&[
        SESSION_SALT_DOMAIN,
        credentials.keyword(),
        credentials.pin(),
    ]);
    let params = scrypt::Params::new(
        scrypt_cost_log2(),
        SCRYPT_BLOCK_SIZE,
        SCRYPT_PARALLELIZATION,
        32,
    )
    .map_err(|err| DriveError::IoFailure(format!("scrypt parameters: {err}")))?;
    let mut kek = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(
        credentials.password(),
        &salt.as_bytes()[..16],
        &params,
        kek.as_mut(),
    )
    .map_err(|err| DriveError::IoFailure(format!("key derivation: {err}")))?;
    Ok(kek)
}

/// Seal a session under the full credential triple.
pub fn seal_session(session: &Session, credentials: &UserCredentials) -> Result<Vec<u8>> {
    let kek = derive_session_kek(credentials)?;
    let cipher = Aes256Gcm::new_from_slice(kek.as_ref())
        .map_err(|_| DriveError::IoFailure("session key rejected".into()))?;
    let mut nonce = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), session.serialise()?.as_slice())
        .map_err(|_| DriveError::IoFailure("session encryption failed".into()))?;
    serde_json::to_vec(&SealedSession { nonce, ciphertext })
        .map_err(|err| DriveError::IoFailure(format!("serialise sealed session: {err}")))
}

/// Unseal a session; any failure along the way is an authentication failure.
pub fn unseal_session(blob: &[u8], credentials: &UserCredentials) -> Result<Session> {
    let sealed: SealedSession =
        serde_json::from_slice(blob).map_err(|_| DriveError::InvalidCredentials)?;
    let kek = derive_session_kek(credentials)?;
    let cipher = Aes256Gcm::new_from_slice(kek.as_ref())
        .map_err(|_| DriveError::IoFailure("session key rejected".into()))?;
    let plain = cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| DriveError::InvalidCredentials)?;
    Session::parse(&plain)
}
