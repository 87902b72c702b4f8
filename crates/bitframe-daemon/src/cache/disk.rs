//! Filesystem cache backend.
//!
//! Layout under the root directory:
//! - `<fingerprint>/frame_NNN_o.png` decoded source frame NNN
//! - `<fingerprint>/frame_NNN_t.png` normalized frame NNN
//! - `<fingerprint>/image.bin` packed blob
//!
//! Entries are assembled in a `.staging-*` sibling directory and published
//! with a single rename, so a visible `<fingerprint>` directory is always
//! complete.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bitframe_codec::{PackedBlob, Transcoded};
use image::ImageFormat;
use tracing::{debug, info, warn};

use super::{ArtifactStore, BlobLocation, StoreError};
use crate::request::Fingerprint;

/// File name of the packed blob inside an entry.
pub const BLOB_FILE: &str = "image.bin";

const STAGING_PREFIX: &str = ".staging-";

pub struct DiskStore {
    root: PathBuf,
    nonce: AtomicU64,
}

impl DiskStore {
    /// Opens (creating if needed) a cache rooted at `root`.
    ///
    /// Staging directories left behind by an interrupted process are
    /// removed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                warn!("Removing abandoned cache staging directory {:?}", entry.path());
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    warn!("Failed to remove {:?}: {}", entry.path(), e);
                }
            }
        }

        info!("Disk cache opened at {:?}", root);
        Ok(Self {
            root,
            nonce: AtomicU64::new(0),
        })
    }

    /// Directory holding a published entry.
    pub fn entry_dir(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(fingerprint.as_str())
    }

    fn blob_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.entry_dir(fingerprint).join(BLOB_FILE)
    }

    fn staging_dir(&self, fingerprint: &Fingerprint) -> PathBuf {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            "{}{}-{}-{}",
            STAGING_PREFIX,
            fingerprint,
            std::process::id(),
            nonce
        ))
    }

    fn write_entry(dir: &Path, artifacts: &Transcoded) -> Result<(), StoreError> {
        fs::create_dir(dir)?;

        for frame in &artifacts.decoded {
            let path = dir.join(format!("frame_{:03}_o.png", frame.index));
            frame.image.save_with_format(&path, ImageFormat::Png)?;
        }
        for frame in &artifacts.normalized {
            let path = dir.join(format!("frame_{:03}_t.png", frame.index));
            frame.image.save_with_format(&path, ImageFormat::Png)?;
        }

        let mut file = File::create(dir.join(BLOB_FILE))?;
        file.write_all(artifacts.blob.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Removes an entry directory that exists without its blob, which only
    /// happens after external tampering. Publishing over it would otherwise
    /// fail on every attempt.
    fn clear_incomplete(&self, fingerprint: &Fingerprint, target: &Path) -> Result<(), StoreError> {
        if !target.is_dir() || self.lookup(fingerprint)?.is_some() {
            return Ok(());
        }
        warn!("Removing cache entry {:?} that has no {}", target, BLOB_FILE);
        match fs::remove_dir_all(target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn not_found(fingerprint: &Fingerprint, e: std::io::Error) -> StoreError {
        if e.kind() == ErrorKind::NotFound {
            StoreError::NotFound(fingerprint.clone())
        } else {
            StoreError::Io(e)
        }
    }
}

impl ArtifactStore for DiskStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<BlobLocation>, StoreError> {
        match fs::metadata(self.blob_path(fingerprint)) {
            Ok(meta) => Ok(Some(BlobLocation {
                fingerprint: fingerprint.clone(),
                len: meta.len(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, fingerprint: &Fingerprint, artifacts: &Transcoded) -> Result<BlobLocation, StoreError> {
        let staging = self.staging_dir(fingerprint);

        if let Err(e) = Self::write_entry(&staging, artifacts) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        let target = self.entry_dir(fingerprint);
        if let Err(e) = self.clear_incomplete(fingerprint, &target) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        match fs::rename(&staging, &target) {
            Ok(()) => {
                info!(
                    "Published cache entry {} ({} frame(s), {} bytes)",
                    fingerprint,
                    artifacts.normalized.len(),
                    artifacts.blob.len()
                );
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                // Losing a publish race is fine; the entry is deterministic.
                if self.lookup(fingerprint)?.is_none() {
                    return Err(e.into());
                }
                debug!("Cache entry {} was published concurrently", fingerprint);
            }
        }

        self.lookup(fingerprint)?
            .ok_or_else(|| StoreError::NotFound(fingerprint.clone()))
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<PackedBlob, StoreError> {
        let bytes = fs::read(self.blob_path(fingerprint)).map_err(|e| Self::not_found(fingerprint, e))?;
        Ok(PackedBlob::from_bytes(bytes))
    }

    fn read_range(&self, fingerprint: &Fingerprint, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        let mut file = File::open(self.blob_path(fingerprint)).map_err(|e| Self::not_found(fingerprint, e))?;
        let size = file.metadata()?.len();
        if offset.checked_add(len).map_or(true, |end| end > size) {
            return Err(StoreError::OutOfBounds { offset, len, size });
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
