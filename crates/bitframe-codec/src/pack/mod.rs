//! Pixel packing into device encodings.

pub mod mono;
pub mod rgb565;

pub use mono::MonoHeader;

use image::RgbImage;

use crate::{Error, Frame, Result, Variant};

/// Immutable device encoding of a whole frame sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBlob(Vec<u8>);

impl PackedBlob {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for PackedBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Shape of a packed blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobLayout {
    pub variant: Variant,
    pub width: u32,
    pub height: u32,
    pub frames: usize,
}

impl BlobLayout {
    /// Encoded size of a single frame.
    pub fn frame_len(&self) -> usize {
        match self.variant {
            Variant::Mono => mono::row_stride(self.width) * self.height as usize,
            Variant::Color => self.width as usize * self.height as usize * rgb565::BYTES_PER_PIXEL,
        }
    }

    /// Offset of the first frame.
    pub fn header_len(&self) -> usize {
        if self.variant.has_header() {
            mono::HEADER_LEN
        } else {
            0
        }
    }

    /// Total blob size.
    pub fn len(&self) -> usize {
        self.header_len() + self.frame_len() * self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Works out the layout of an existing blob.
    ///
    /// Mono blobs carry their own dimensions; color blobs need `dimensions`
    /// supplied by the caller. Fails when the length leaves a partial frame.
    pub fn detect(variant: Variant, blob: &[u8], dimensions: Option<(u32, u32)>) -> Result<Self> {
        let layout_error = || Error::BlobLayout {
            variant: variant.to_string(),
            len: blob.len(),
        };

        let (width, height) = match variant {
            Variant::Mono => {
                let header = MonoHeader::parse(blob).ok_or_else(layout_error)?;
                (header.width, header.height)
            }
            Variant::Color => dimensions.ok_or_else(layout_error)?,
        };

        let mut layout = Self {
            variant,
            width,
            height,
            frames: 0,
        };
        let frame_len = layout.frame_len();
        let body = blob.len() - layout.header_len();
        if frame_len == 0 || body % frame_len != 0 {
            return Err(layout_error());
        }
        layout.frames = body / frame_len;
        Ok(layout)
    }
}

/// Encodes a frame sequence.
///
/// All frames must share the dimensions of the first one.
pub fn pack(variant: Variant, frames: &[Frame]) -> Result<PackedBlob> {
    let first = frames.first().ok_or(Error::NoFrames)?;
    let (width, height) = (first.width(), first.height());

    for frame in frames {
        if (frame.width(), frame.height()) != (width, height) {
            return Err(Error::FrameSize {
                index: frame.index,
                width,
                height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
    }

    let layout = BlobLayout {
        variant,
        width,
        height,
        frames: frames.len(),
    };
    let mut out = Vec::with_capacity(layout.len());

    match variant {
        Variant::Mono => {
            out.extend_from_slice(&MonoHeader::new(width, height).to_bytes());
            for frame in frames {
                mono::pack_frame(frame, &mut out);
            }
        }
        Variant::Color => {
            for frame in frames {
                rgb565::pack_frame(frame, &mut out);
            }
        }
    }

    debug_assert_eq!(out.len(), layout.len());
    Ok(PackedBlob(out))
}

/// Decodes a blob back into viewable frames.
pub fn unpack(blob: &[u8], layout: &BlobLayout) -> Result<Vec<RgbImage>> {
    if blob.len() != layout.len() {
        return Err(Error::BlobLayout {
            variant: layout.variant.to_string(),
            len: blob.len(),
        });
    }

    let frame_len = layout.frame_len();
    let body = &blob[layout.header_len()..];
    let frames = body
        .chunks_exact(frame_len)
        .map(|chunk| match layout.variant {
            Variant::Mono => mono::unpack_frame(chunk, layout.width, layout.height),
            Variant::Color => rgb565::unpack_frame(chunk, layout.width, layout.height),
        })
        .collect();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frames(count: usize, width: u32, height: u32) -> Vec<Frame> {
        (0..count)
            .map(|i| {
                let shade = (i * 100 % 256) as u8;
                Frame::new(i, RgbImage::from_pixel(width, height, Rgb([shade, shade, shade])))
            })
            .collect()
    }

    #[test]
    fn test_mono_length_and_header() {
        let blob = pack(Variant::Mono, &frames(3, 13, 5)).unwrap();
        // 13 px -> 2 bytes per row
        assert_eq!(blob.len(), 8 + 3 * 5 * 2);
        assert_eq!(MonoHeader::parse(blob.as_bytes()), Some(MonoHeader::new(13, 5)));
    }

    #[test]
    fn test_color_length_has_no_header() {
        let blob = pack(Variant::Color, &frames(2, 4, 3)).unwrap();
        assert_eq!(blob.len(), 2 * 4 * 3 * 2);
    }

    #[test]
    fn test_length_matches_layout() {
        for variant in [Variant::Mono, Variant::Color] {
            for (w, h, n) in [(1, 1, 1), (8, 2, 4), (9, 9, 2), (384, 384, 1), (128, 160, 3)] {
                let blob = pack(variant, &frames(n, w, h)).unwrap();
                let layout = BlobLayout {
                    variant,
                    width: w,
                    height: h,
                    frames: n,
                };
                assert_eq!(blob.len(), layout.len());
            }
        }
    }

    #[test]
    fn test_packing_is_deterministic() {
        let input = frames(4, 31, 7);
        for variant in [Variant::Mono, Variant::Color] {
            assert_eq!(pack(variant, &input).unwrap(), pack(variant, &input).unwrap());
        }
    }

    #[test]
    fn test_frames_keep_order() {
        let input = vec![
            Frame::new(0, RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]))),
            Frame::new(1, RgbImage::from_pixel(1, 1, Rgb([0, 0, 255]))),
        ];
        let blob = pack(Variant::Color, &input).unwrap();
        assert_eq!(blob.as_bytes(), &[0xF8, 0x00, 0x00, 0x1F]);
    }

    #[test]
    fn test_rejects_mixed_sizes() {
        let mut input = frames(2, 4, 4);
        input.push(Frame::new(2, RgbImage::new(5, 4)));
        assert!(matches!(
            pack(Variant::Mono, &input),
            Err(Error::FrameSize { index: 2, .. })
        ));
        assert!(matches!(pack(Variant::Color, &[]), Err(Error::NoFrames)));
    }

    #[test]
    fn test_detect_layout() {
        let blob = pack(Variant::Mono, &frames(3, 10, 4)).unwrap();
        let layout = BlobLayout::detect(Variant::Mono, blob.as_bytes(), None).unwrap();
        assert_eq!((layout.width, layout.height, layout.frames), (10, 4, 3));

        let blob = pack(Variant::Color, &frames(2, 6, 5)).unwrap();
        let layout = BlobLayout::detect(Variant::Color, blob.as_bytes(), Some((6, 5))).unwrap();
        assert_eq!(layout.frames, 2);
        assert!(BlobLayout::detect(Variant::Color, blob.as_bytes(), None).is_err());
        assert!(BlobLayout::detect(Variant::Color, blob.as_bytes(), Some((7, 5))).is_err());
    }

    #[test]
    fn test_unpack_round_trip() {
        let input = frames(2, 9, 3);
        let blob = pack(Variant::Mono, &input).unwrap();
        let layout = BlobLayout::detect(Variant::Mono, blob.as_bytes(), None).unwrap();
        let images = unpack(blob.as_bytes(), &layout).unwrap();
        assert_eq!(images.len(), 2);
        // shade 0 is dark, shade 100 is still below threshold
        assert!(images[0].pixels().all(|p| p.0 == [0, 0, 0]));
        assert!(images[1].pixels().all(|p| p.0 == [0, 0, 0]));
    }
}
