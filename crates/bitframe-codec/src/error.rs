//! Error types for the bitframe codec.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding, normalizing or packing frames.
#[derive(Error, Debug)]
pub enum Error {
    /// Source bytes do not start with a recognized image signature.
    #[error("Unrecognized image format")]
    UnsupportedFormat,

    /// The image library rejected the source.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// An animation decoded to zero frames.
    #[error("Image contains no frames")]
    NoFrames,

    /// Source canvas exceeds the decode limits.
    #[error("Source image {width}x{height} exceeds the decode limits")]
    SourceTooLarge { width: u32, height: u32 },

    /// Decoded frames outgrew the allocation budget.
    #[error("Decoded frames exceed the {limit}-byte budget at frame {frames}")]
    DecodeBudget { frames: usize, limit: u64 },

    /// Source frame has a zero-sized side.
    #[error("Frame {index} is empty")]
    EmptyFrame { index: usize },

    /// Target canvas is zero-sized or too large.
    #[error("Invalid target dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Frames handed to the packer disagree on size.
    #[error("Frame {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameSize {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Unknown pixel encoding name.
    #[error("Invalid variant: {0}")]
    InvalidVariant(String),

    /// Blob length is inconsistent with its layout.
    #[error("Blob of {len} bytes does not match the {variant} layout")]
    BlobLayout { variant: String, len: usize },
}
