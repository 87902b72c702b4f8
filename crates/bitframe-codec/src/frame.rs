//! Frame types flowing through the pipeline.

use image::{RgbImage, RgbaImage};

/// A coalesced frame at source resolution.
///
/// Animated sources are composited frame over frame during decoding, so
/// each `DecodedFrame` is a complete picture on its own.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Position in the source animation, starting at 0.
    pub index: usize,
    /// Straight-alpha pixels.
    pub image: RgbaImage,
}

impl DecodedFrame {
    pub fn new(index: usize, image: RgbaImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A frame fitted onto the opaque target canvas, ready for packing.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the source animation, starting at 0.
    pub index: usize,
    /// Opaque 8-bit RGB pixels.
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
