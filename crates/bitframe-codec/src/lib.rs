//! bitframe codec library
//!
//! Turns still or animated source images into the compact pixel encodings
//! understood by small embedded displays: a 1-bit thresholded bitmap with a
//! size header, or headerless big-endian RGB565.

pub mod decode;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod pack;
pub mod variant;

pub use decode::{decode_frames, DecodeLimits};
pub use error::{Error, Result};
pub use frame::{DecodedFrame, Frame};
pub use geometry::{fit_within, normalize_frame, normalize_frames};
pub use pack::{pack, unpack, BlobLayout, MonoHeader, PackedBlob};
pub use variant::Variant;

/// Largest width or height accepted for a target canvas.
pub const MAX_DIMENSION: u32 = 4096;

/// Every artifact produced while transcoding one source image.
#[derive(Debug, Clone)]
pub struct Transcoded {
    /// Coalesced frames at source resolution.
    pub decoded: Vec<DecodedFrame>,
    /// Frames fitted and centered on the target canvas.
    pub normalized: Vec<Frame>,
    /// Final device encoding of all frames.
    pub blob: PackedBlob,
}

/// Runs decode, normalize and pack over raw source bytes.
pub fn transcode(
    bytes: &[u8],
    variant: Variant,
    width: u32,
    height: u32,
    limits: &DecodeLimits,
) -> Result<Transcoded> {
    geometry::validate_target(width, height)?;
    let decoded = decode_frames(bytes, limits)?;
    let normalized = normalize_frames(&decoded, width, height)?;
    let blob = pack(variant, &normalized)?;
    tracing::debug!(
        "Transcoded {} frame(s) to {} {}x{} ({} bytes)",
        normalized.len(),
        variant,
        width,
        height,
        blob.len()
    );
    Ok(Transcoded {
        decoded,
        normalized,
        blob,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, _| {
            if x % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([40, 90, 200, 255])
            }
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_mono_header_round_trip() {
        for (w, h) in [(384, 384), (100, 37), (7, 300)] {
            let out = transcode(&png(64, 48), Variant::Mono, w, h, &DecodeLimits::default()).unwrap();
            let header = MonoHeader::parse(out.blob.as_bytes()).unwrap();
            assert_eq!((header.width, header.height), (w, h));
        }
    }

    #[test]
    fn test_transcode_is_deterministic() {
        let source = png(50, 20);
        for variant in [Variant::Mono, Variant::Color] {
            let a = transcode(&source, variant, 128, 160, &DecodeLimits::default()).unwrap();
            let b = transcode(&source, variant, 128, 160, &DecodeLimits::default()).unwrap();
            assert_eq!(a.blob, b.blob);
        }
    }

    #[test]
    fn test_transcode_keeps_all_artifacts() {
        let out = transcode(&png(30, 10), Variant::Color, 16, 16, &DecodeLimits::default()).unwrap();
        assert_eq!(out.decoded.len(), 1);
        assert_eq!((out.decoded[0].width(), out.decoded[0].height()), (30, 10));
        assert_eq!((out.normalized[0].width(), out.normalized[0].height()), (16, 16));
        assert_eq!(out.blob.len(), 16 * 16 * 2);
    }

    #[test]
    fn test_invalid_target_is_rejected_before_decoding() {
        let result = transcode(b"not an image", Variant::Mono, MAX_DIMENSION + 1, 8, &DecodeLimits::default());
        assert!(matches!(result, Err(Error::InvalidDimensions { .. })));
    }
}
