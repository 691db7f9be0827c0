//! The opaque description of one encrypted content stream.

use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

use crate::error::{DriveError, Result};
use crate::id::ObjectId;

/// One encrypted chunk of a stream: where it lives and how to open it.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDetail {
    /// Chunk-store name, derived from the ciphertext digest.
    pub name: ObjectId,
    /// Plaintext size of this chunk.
    pub size: u32,
    /// Content key, derived from the plaintext digest.
    #[serde_as(as = "Base64")]
    pub key: [u8; 32],
}

/// Enumerates the chunks that constitute a single content stream.
///
/// Streams small enough to not warrant chunking are carried inline in
/// `content`; `chunks` and `content` are never both populated.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMap {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<ChunkDetail>,
    #[serde_as(as = "Base64")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<u8>,
}

impl DataMap {
    /// Total plaintext size described by this map.
    pub fn size(&self) -> u64 {
        if self.chunks.is_empty() {
            self.content.len() as u64
        } else {
            self.chunks.iter().map(|chunk| u64::from(chunk.size)).sum()
        }
    }

    /// True iff the map describes an empty stream.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.content.is_empty()
    }

    /// Bytestring round-trip: serialize.
    pub fn serialise(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|err| DriveError::InvalidParameter(format!("serialise data map: {err}")))
    }

    /// Bytestring round-trip: parse.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|err| DriveError::InvalidParameter(format!("parse data map: {err}")))
    }
}
