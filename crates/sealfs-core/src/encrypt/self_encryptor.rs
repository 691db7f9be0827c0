//! Random-access encrypted stream backed by the chunk store.

use std::sync::Arc;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::encrypt::data_map::{ChunkDetail, DataMap};
use crate::error::{DriveError, Result};
use crate::id::ObjectId;
use crate::store::ChunkStore;

/// Plaintext size of every chunk except possibly the last.
pub const CHUNK_SIZE: u32 = 1 << 20;

/// Streams at or below this size are carried inline in the data map.
pub const INLINE_CONTENT_MAX: usize = 4096;

/// Largest representable stream.
pub const MAX_STREAM_SIZE: u64 = u32::MAX as u64;

/// A decrypted working copy of one content stream.
///
/// Construction materializes the stream described by the data map; reads and
/// writes operate on the in-memory copy and [`flush`](SelfEncryptor::flush)
/// commits the result back to the store as fresh chunks, replacing the data
/// map. After a successful flush the map is the canonical description of the
/// stream and can be reopened through the same store.
pub struct SelfEncryptor {
    store: Arc<dyn ChunkStore>,
    data_map: DataMap,
    buffer: Vec<u8>,
    dirty: bool,
}

impl SelfEncryptor {
    /// Open the stream described by `data_map`.
    pub fn new(data_map: DataMap, store: Arc<dyn ChunkStore>) -> Result<Self> {
        let mut buffer = Vec::with_capacity(data_map.size() as usize);
        if data_map.chunks.is_empty() {
            buffer.extend_from_slice(&data_map.content);
        } else {
            for chunk in &data_map.chunks {
                let ciphertext = store.get(&chunk.name)?;
                buffer.extend_from_slice(&decrypt_chunk(chunk, &ciphertext)?);
            }
        }
        Ok(SelfEncryptor {
            store,
            data_map,
            buffer,
            dirty: false,
        })
    }

    /// Copy stream bytes at `offset` into `buf`; returns the count copied.
    ///
    /// Reads past the end of the stream copy nothing.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        if offset >= self.buffer.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let end = (start + buf.len()).min(self.buffer.len());
        buf[..end - start].copy_from_slice(&self.buffer[start..end]);
        Ok(end - start)
    }

    /// Write `data` at `offset`, zero-filling any gap past the current end.
    pub fn write(&mut self, data: &[u8], offset: u64) -> Result<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|end| *end <= MAX_STREAM_SIZE)
            .ok_or_else(|| {
                DriveError::InvalidParameter(format!("write past representable size: {offset}"))
            })?;
        if end as usize > self.buffer.len() {
            self.buffer.resize(end as usize, 0);
        }
        self.buffer[offset as usize..end as usize].copy_from_slice(data);
        self.dirty = true;
        Ok(())
    }

    /// Resize the stream; growth zero-fills.
    pub fn truncate(&mut self, size: u64) -> Result<()> {
        if size > MAX_STREAM_SIZE {
            return Err(DriveError::InvalidParameter(format!(
                "truncate past representable size: {size}"
            )));
        }
        if size as usize != self.buffer.len() {
            self.buffer.resize(size as usize, 0);
            self.dirty = true;
        }
        Ok(())
    }

    /// Current stream size: the high-water mark of writes unless truncated.
    pub fn size(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// The data map describing the stream as of the last flush.
    pub fn data_map(&self) -> &DataMap {
        &self.data_map
    }

    /// Commit pending writes as chunks and finalize the data map.
    ///
    /// Chunks of the previous map that the new map no longer references are
    /// released. A no-op when nothing changed since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        // Build and store the replacement map before touching the old one, so
        // a failed put leaves the previous map intact and reopenable.
        let mut fresh = DataMap::default();
        if self.buffer.len() <= INLINE_CONTENT_MAX {
            fresh.content = self.buffer.clone();
        } else {
            for plain in self.buffer.chunks(CHUNK_SIZE as usize) {
                let (detail, ciphertext) = encrypt_chunk(plain)?;
                self.store.put(&detail.name, &ciphertext)?;
                fresh.chunks.push(detail);
            }
        }

        for stale in &self.data_map.chunks {
            if fresh.chunks.iter().any(|chunk| chunk.name == stale.name) {
                continue;
            }
            if let Err(err) = self.store.delete(&stale.name) {
                if !err.is_not_found() {
                    return Err(err);
                }
            }
        }

        self.data_map = fresh;
        self.dirty = false;
        Ok(())
    }

    /// Release every chunk the current data map references.
    pub fn delete_all_chunks(&mut self) -> Result<()> {
        for chunk in &self.data_map.chunks {
            if let Err(err) = self.store.delete(&chunk.name) {
                if err.is_not_found() {
                    warn!(chunk = %chunk.name, "chunk already absent on delete");
                } else {
                    return Err(err);
                }
            }
        }
        self.data_map = DataMap::default();
        Ok(())
    }
}

/// Key derived from the plaintext digest; identical content yields identical
/// chunks, so rewrites of unchanged regions dedupe in the store.
fn content_key(plain: &[u8]) -> [u8; 32] {
    Sha256::digest(plain).into()
}

/// Nonce derived from the key. Each key seals exactly one plaintext (the one
/// it was derived from), so the fixed derivation cannot repeat a (key, nonce)
/// pair across distinct messages.
fn content_nonce(key: &[u8; 32]) -> [u8; 12] {
    let digest = Sha256::digest(key);
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&digest[..12]);
    nonce
}

fn encrypt_chunk(plain: &[u8]) -> Result<(ChunkDetail, Vec<u8>)> {
    let key = content_key(plain);
    let nonce = content_nonce(&key);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|_| DriveError::IoFailure("malformed chunk key".into()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plain)
        .map_err(|_| DriveError::IoFailure("chunk encryption failed".into()))?;
    let name = ObjectId::from_digest(&ciphertext);
    Ok((
        ChunkDetail {
            name,
            size: plain.len() as u32,
            key,
        },
        ciphertext,
    ))
}

fn decrypt_chunk(detail: &ChunkDetail, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let nonce = content_nonce(&detail.key);
    let cipher = Aes256Gcm::new_from_slice(&detail.key)
        .map_err(|_| DriveError::IoFailure("malformed chunk key".into()))?;
    let plain = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext)
        .map_err(|_| DriveError::IoFailure(format!("chunk {} failed authentication", detail.name)))?;
    if plain.len() as u64 != u64::from(detail.size) {
        return Err(DriveError::IoFailure(format!(
            "chunk {} size mismatch",
            detail.name
        )));
    }
    Ok(plain)
}
