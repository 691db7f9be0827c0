//! Self-encryption of content streams and directory envelopes.
//!
//! A content stream (file payload or serialized directory listing) is split
//! into content-addressed chunks, each sealed under a key derived from its
//! own plaintext, and described by a [`DataMap`]. The data map is the only
//! way back to the bytes; for directories it is itself encrypted into an
//! envelope bound to the directory's position in the tree.

mod data_map;
mod envelope;
mod self_encryptor;

pub use data_map::{ChunkDetail, DataMap};
pub use envelope::{decrypt_data_map, encrypt_data_map, OwnerDirectory};
pub use self_encryptor::{SelfEncryptor, CHUNK_SIZE, INLINE_CONTENT_MAX, MAX_STREAM_SIZE};
