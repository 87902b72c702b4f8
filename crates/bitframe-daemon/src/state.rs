//! Application state and the transcoding pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bitframe_codec::PackedBlob;
use tracing::{debug, info, warn};

use crate::cache::{ArtifactStore, BlobLocation, DiskStore, MemoryStore};
use crate::config::{CacheBackend, Config};
use crate::error::TranscodeError;
use crate::fetch::{HttpFetcher, SourceFetcher};
use crate::flight::{self, Flight, SingleFlight};
use crate::request::{Fingerprint, TranscodeRequest};

/// Shared application state.
pub struct AppState {
    /// Configuration
    config: Config,

    /// Artifact cache backend
    store: Arc<dyn ArtifactStore>,

    /// Source image retrieval
    fetcher: Arc<dyn SourceFetcher>,

    /// In-progress computations by fingerprint
    flights: SingleFlight,
}

impl AppState {
    /// Creates application state from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn ArtifactStore> = match config.cache.backend {
            CacheBackend::Disk => Arc::new(
                DiskStore::open(&config.cache.dir).context("Failed to open disk cache")?,
            ),
            CacheBackend::Memory => {
                info!("Using in-memory cache; entries are lost on restart");
                Arc::new(MemoryStore::new())
            }
        };
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch).context("Failed to build HTTP client")?);
        Ok(Self::with_parts(config, store, fetcher))
    }

    /// Creates application state from explicit collaborators.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn ArtifactStore>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            flights: SingleFlight::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the published blob for `request`, computing it on a miss.
    pub async fn ensure(&self, request: &TranscodeRequest) -> Result<BlobLocation, TranscodeError> {
        let fingerprint = request.fingerprint();

        if let Some(location) = self.lookup(&fingerprint).await? {
            debug!("Cache hit for {}", fingerprint);
            return Ok(location);
        }
        debug!("Cache miss for {}", fingerprint);

        if !self.config.single_flight.enable {
            return self.materialize(request, &fingerprint).await;
        }

        match self.flights.join(&fingerprint) {
            Flight::Leader(_guard) => {
                // A previous leader may have published since the first lookup.
                if let Some(location) = self.lookup(&fingerprint).await? {
                    return Ok(location);
                }
                self.materialize(request, &fingerprint).await
            }
            Flight::Follower(rx) => {
                let wait = Duration::from_secs(self.config.single_flight.wait_secs);
                if flight::wait(rx, wait).await {
                    if let Some(location) = self.lookup(&fingerprint).await? {
                        debug!("Reusing concurrent result for {}", fingerprint);
                        return Ok(location);
                    }
                    debug!("Concurrent computation of {} failed, retrying", fingerprint);
                } else {
                    warn!(
                        "Timed out after {:?} waiting for {}, computing independently",
                        wait, fingerprint
                    );
                }
                self.materialize(request, &fingerprint).await
            }
        }
    }

    /// Runs fetch, decode, normalize and pack, then publishes the result.
    pub async fn materialize(
        &self,
        request: &TranscodeRequest,
        fingerprint: &Fingerprint,
    ) -> Result<BlobLocation, TranscodeError> {
        info!(
            "Transcoding {} to {} {}x{} ({})",
            request.url, request.variant, request.width, request.height, fingerprint
        );
        debug!("{} computation(s) in flight", self.flights.len());

        let source = self.fetcher.fetch(&request.url).await?;

        let (variant, width, height) = (request.variant, request.width, request.height);
        let limits = self.config.limits.decode_limits();
        let artifacts = tokio::task::spawn_blocking(move || {
            bitframe_codec::transcode(&source, variant, width, height, &limits)
        })
        .await?
        .map_err(TranscodeError::from_codec)?;

        let store = self.store.clone();
        let fingerprint = fingerprint.clone();
        tokio::task::spawn_blocking(move || store.put(&fingerprint, &artifacts))
            .await?
            .map_err(TranscodeError::CacheWrite)
    }

    /// Checks whether an entry has been published.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<BlobLocation>, TranscodeError> {
        let store = self.store.clone();
        let fingerprint = fingerprint.clone();
        tokio::task::spawn_blocking(move || store.lookup(&fingerprint))
            .await?
            .map_err(TranscodeError::CacheLookup)
    }

    /// Reads a whole published blob.
    pub async fn read_blob(&self, location: &BlobLocation) -> Result<PackedBlob, TranscodeError> {
        let store = self.store.clone();
        let fingerprint = location.fingerprint.clone();
        tokio::task::spawn_blocking(move || store.get(&fingerprint))
            .await?
            .map_err(|source| TranscodeError::ArtifactMissing {
                fingerprint: location.fingerprint.clone(),
                source,
            })
    }

    /// Reads `len` bytes of a published blob starting at `offset`.
    pub async fn read_range(
        &self,
        location: &BlobLocation,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, TranscodeError> {
        let store = self.store.clone();
        let fingerprint = location.fingerprint.clone();
        tokio::task::spawn_blocking(move || store.read_range(&fingerprint, offset, len))
            .await?
            .map_err(|source| TranscodeError::ArtifactMissing {
                fingerprint: location.fingerprint.clone(),
                source,
            })
    }
}
