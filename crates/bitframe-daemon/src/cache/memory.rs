//! In-process cache backend.
//!
//! Keeps only the packed blob of each entry; intermediate frames are
//! dropped.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bitframe_codec::{PackedBlob, Transcoded};

use super::{ArtifactStore, BlobLocation, StoreError};
use crate::request::Fingerprint;

#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<Fingerprint, Arc<PackedBlob>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blob(&self, fingerprint: &Fingerprint) -> Result<Arc<PackedBlob>, StoreError> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        blobs
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(fingerprint.clone()))
    }
}

impl ArtifactStore for MemoryStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<BlobLocation>, StoreError> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        Ok(blobs.get(fingerprint).map(|blob| BlobLocation {
            fingerprint: fingerprint.clone(),
            len: blob.len() as u64,
        }))
    }

    fn put(&self, fingerprint: &Fingerprint, artifacts: &Transcoded) -> Result<BlobLocation, StoreError> {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        let blob = blobs
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(artifacts.blob.clone()));
        Ok(BlobLocation {
            fingerprint: fingerprint.clone(),
            len: blob.len() as u64,
        })
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<PackedBlob, StoreError> {
        Ok(self.blob(fingerprint)?.as_ref().clone())
    }

    fn read_range(&self, fingerprint: &Fingerprint, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        let blob = self.blob(fingerprint)?;
        let size = blob.len() as u64;
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(blob.as_bytes()[offset as usize..end as usize].to_vec()),
            _ => Err(StoreError::OutOfBounds { offset, len, size }),
        }
    }
}
