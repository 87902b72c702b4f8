//! Error types for the transcoding service.

use thiserror::Error;

use crate::cache::StoreError;
use crate::fetch::FetchError;
use crate::request::Fingerprint;

/// Failures surfaced to callers of the transcoding pipeline.
///
/// Each kind maps to a distinct HTTP status; none is folded into an empty
/// or default response.
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// A request parameter could not be used.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Source image could not be retrieved.
    #[error("Failed to fetch source image: {0}")]
    Fetch(#[from] FetchError),

    /// Source bytes are not a usable image.
    #[error("Failed to decode source image: {0}")]
    Decode(#[source] bitframe_codec::Error),

    /// Cache entry could not be written.
    #[error("Failed to write cache entry: {0}")]
    CacheWrite(#[source] StoreError),

    /// Cache could not be queried.
    #[error("Failed to query cache: {0}")]
    CacheLookup(#[source] StoreError),

    /// Entry was reported present but its blob could not be read.
    #[error("Cached artifact {fingerprint} is missing: {source}")]
    ArtifactMissing {
        fingerprint: Fingerprint,
        #[source]
        source: StoreError,
    },

    /// Background worker died before producing a result.
    #[error("Transcode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl TranscodeError {
    /// Classifies a codec failure: a rejected target canvas is a parameter
    /// problem, everything else is about the source.
    pub fn from_codec(err: bitframe_codec::Error) -> Self {
        match err {
            bitframe_codec::Error::InvalidDimensions { width, height } => TranscodeError::InvalidParameter {
                name: if (1..=bitframe_codec::MAX_DIMENSION).contains(&width) {
                    "height"
                } else {
                    "width"
                },
                reason: format!(
                    "target {}x{} must be between 1x1 and {max}x{max}",
                    width,
                    height,
                    max = bitframe_codec::MAX_DIMENSION
                ),
            },
            other => TranscodeError::Decode(other),
        }
    }
}
