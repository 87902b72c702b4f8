//! Content-addressed artifact cache.
//!
//! Entries are keyed by request fingerprint and never expire. An entry is
//! either fully present or absent: backends publish atomically, so a
//! failed or in-progress write never satisfies `lookup`.

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use bitframe_codec::{PackedBlob, Transcoded};
use thiserror::Error;

use crate::request::Fingerprint;

/// Errors raised by cache backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No published entry for the fingerprint.
    #[error("No cache entry for {0}")]
    NotFound(Fingerprint),

    /// Requested slice lies outside the blob.
    #[error("Range {offset}+{len} is outside a {size} byte blob")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    /// Filesystem failure.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Intermediate frame could not be encoded.
    #[error("Failed to encode frame image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Where a published blob lives and how big it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    pub fingerprint: Fingerprint,
    pub len: u64,
}

/// Key-value storage for transcoding artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Returns the blob location if an entry has been published.
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<BlobLocation>, StoreError>;

    /// Publishes every artifact of a transcode under `fingerprint`.
    ///
    /// If another writer published the same fingerprint first, the
    /// existing entry is kept and returned.
    fn put(&self, fingerprint: &Fingerprint, artifacts: &Transcoded) -> Result<BlobLocation, StoreError>;

    /// Reads a whole published blob.
    fn get(&self, fingerprint: &Fingerprint) -> Result<PackedBlob, StoreError>;

    /// Reads exactly `len` bytes starting at `offset`.
    fn read_range(&self, fingerprint: &Fingerprint, offset: u64, len: u64) -> Result<Vec<u8>, StoreError>;
}
