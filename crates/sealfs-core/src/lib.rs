//! Storage and metadata engine for an encrypted virtual drive.
//!
//! Every file payload and every directory listing is persisted as a set of
//! content-addressed, self-encrypted chunks in a keyed blob store. Directory
//! listings are documents in their own right: each is serialized, run through
//! a [`SelfEncryptor`](encrypt::SelfEncryptor), and the resulting data map is
//! sealed in an envelope cryptographically bound to the listing's position in
//! the tree (parent id + own id), then signed by the owner key.
//!
//! The [`DirectoryHandler`](handler::DirectoryHandler) owns the credential
//! bootstrap: three user secrets (keyword, pin, password) deterministically
//! locate a sealed [`Session`](session::Session) record from which the root
//! directory chain is recovered on every subsequent mount.

#![forbid(unsafe_code)]

pub mod encrypt;
pub mod error;
pub mod handler;
pub mod id;
pub mod listing;
pub mod meta_data;
pub mod path;
pub mod session;
pub mod store;

pub use error::{DriveError, Result};
pub use id::{DirectoryId, ObjectId};
pub use listing::{DirectoryData, DirectoryListing};
pub use meta_data::MetaData;
pub use session::{Session, UserCredentials};
pub use store::ChunkStore;
