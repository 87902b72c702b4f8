//! Source image decoding.
//!
//! Animated GIF and APNG sources are expanded into fully composited
//! frames; every other format yields a single frame. Each call builds its
//! own decoder, nothing is shared between calls.
//!
//! Header dimensions are checked against [`DecodeLimits`] before any pixel
//! buffer is allocated, and decoded frames are counted against a byte
//! budget as they are produced.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, DynamicImage, ImageDecoder, ImageFormat, ImageReader, Limits, RgbaImage};
use tracing::debug;

use crate::{DecodedFrame, Error, Result};

const RGBA_BYTES: u64 = 4;

/// Resource bounds applied while decoding one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Largest accepted source width or height.
    pub max_dimension: u32,
    /// Most bytes all decoded RGBA frames may occupy together.
    pub max_decoded_bytes: u64,
}

impl DecodeLimits {
    pub const DEFAULT_MAX_DIMENSION: u32 = 8192;
    pub const DEFAULT_MAX_DECODED_BYTES: u64 = 256 * 1024 * 1024;

    /// Rejects a source canvas that is too wide, too tall, or whose single
    /// RGBA frame would not fit the byte budget.
    pub fn check_source(&self, width: u32, height: u32) -> Result<()> {
        let frame_bytes = u64::from(width) * u64::from(height) * RGBA_BYTES;
        if width > self.max_dimension
            || height > self.max_dimension
            || frame_bytes > self.max_decoded_bytes
        {
            return Err(Error::SourceTooLarge { width, height });
        }
        Ok(())
    }

    fn image_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits.max_alloc = Some(self.max_decoded_bytes);
        limits
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            max_decoded_bytes: Self::DEFAULT_MAX_DECODED_BYTES,
        }
    }
}

/// Decodes raw image bytes into an ordered list of coalesced frames.
pub fn decode_frames(bytes: &[u8], limits: &DecodeLimits) -> Result<Vec<DecodedFrame>> {
    let format = image::guess_format(bytes).map_err(|_| Error::UnsupportedFormat)?;

    let images = match format {
        ImageFormat::Gif => {
            let mut decoder = GifDecoder::new(Cursor::new(bytes))?;
            let (width, height) = decoder.dimensions();
            limits.check_source(width, height)?;
            decoder.set_limits(limits.image_limits())?;
            collect_animation(decoder, limits)?
        }
        ImageFormat::Png => {
            let mut decoder = PngDecoder::new(Cursor::new(bytes))?;
            let (width, height) = decoder.dimensions();
            limits.check_source(width, height)?;
            decoder.set_limits(limits.image_limits())?;
            if decoder.is_apng()? {
                collect_animation(decoder.apng()?, limits)?
            } else {
                vec![DynamicImage::from_decoder(decoder)?.to_rgba8()]
            }
        }
        other => {
            let (width, height) = ImageReader::with_format(Cursor::new(bytes), other).into_dimensions()?;
            limits.check_source(width, height)?;
            let mut reader = ImageReader::with_format(Cursor::new(bytes), other);
            reader.limits(limits.image_limits());
            vec![reader.decode()?.to_rgba8()]
        }
    };

    if images.is_empty() {
        return Err(Error::NoFrames);
    }

    debug!("Decoded {:?} source into {} frame(s)", format, images.len());

    images
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            if image.width() == 0 || image.height() == 0 {
                Err(Error::EmptyFrame { index })
            } else {
                Ok(DecodedFrame::new(index, image))
            }
        })
        .collect()
}

fn collect_animation<'a, D: AnimationDecoder<'a>>(decoder: D, limits: &DecodeLimits) -> Result<Vec<RgbaImage>> {
    let mut used = 0u64;
    let mut images = Vec::new();
    for frame in decoder.into_frames() {
        let image = frame?.into_buffer();
        used += image.as_raw().len() as u64;
        if used > limits.max_decoded_bytes {
            return Err(Error::DecodeBudget {
                frames: images.len() + 1,
                limit: limits.max_decoded_bytes,
            });
        }
        images.push(image);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Rgba};

    fn png_bytes(image: RgbaImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn gif_bytes(colors: &[[u8; 3]]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buf);
            let frames = colors.iter().map(|&[r, g, b]| {
                let image = RgbaImage::from_pixel(6, 4, Rgba([r, g, b, 255]));
                image::Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(100, 1))
            });
            encoder.encode_frames(frames).unwrap();
        }
        buf
    }

    #[test]
    fn test_static_png_is_one_frame() {
        let bytes = png_bytes(RgbaImage::from_pixel(5, 3, Rgba([10, 20, 30, 255])));
        let frames = decode_frames(&bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index, 0);
        assert_eq!((frames[0].width(), frames[0].height()), (5, 3));
        assert_eq!(frames[0].image.get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_animated_gif_keeps_frame_order() {
        let bytes = gif_bytes(&[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        let frames = decode_frames(&bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(frames.len(), 3);

        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index, i);
            assert_eq!((frame.width(), frame.height()), (6, 4));
        }

        let dominant = |frame: &DecodedFrame| {
            let px = frame.image.get_pixel(3, 2);
            (0..3).max_by_key(|&c| px[c]).unwrap()
        };
        assert_eq!(dominant(&frames[0]), 0);
        assert_eq!(dominant(&frames[1]), 1);
        assert_eq!(dominant(&frames[2]), 2);
    }

    #[test]
    fn test_unknown_bytes_are_rejected() {
        let result = decode_frames(b"definitely not an image", &DecodeLimits::default());
        assert!(matches!(result, Err(Error::UnsupportedFormat)));
    }

    #[test]
    fn test_truncated_png_is_rejected() {
        let mut bytes = png_bytes(RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 255])));
        bytes.truncate(40);
        assert!(matches!(decode_frames(&bytes, &DecodeLimits::default()), Err(Error::Image(_))));
    }

    fn indexed_gif(width: u16, height: u16, frames: &[(u16, u16, u16, u16, u8)]) -> Vec<u8> {
        let palette = [255, 0, 0, 0, 0, 255];
        let mut buf = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut buf, width, height, &palette).unwrap();
            for &(left, top, w, h, index) in frames {
                let pixels = vec![index; w as usize * h as usize];
                let mut frame = gif::Frame::from_indexed_pixels(w, h, pixels, None);
                frame.left = left;
                frame.top = top;
                frame.dispose = gif::DisposalMethod::Keep;
                encoder.write_frame(&frame).unwrap();
            }
        }
        buf
    }

    #[test]
    fn test_partial_gif_frame_is_composited_over_previous() {
        // Red 6x4 background, then a 2x2 blue patch at (3, 1).
        let bytes = indexed_gif(6, 4, &[(0, 0, 6, 4, 0), (3, 1, 2, 2, 1)]);
        let frames = decode_frames(&bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(frames.len(), 2);

        let second = &frames[1];
        assert_eq!((second.width(), second.height()), (6, 4));
        for (x, y, pixel) in second.image.enumerate_pixels() {
            let inside = (3..5).contains(&x) && (1..3).contains(&y);
            let expected = if inside { Rgba([0, 0, 255, 255]) } else { Rgba([255, 0, 0, 255]) };
            assert_eq!(*pixel, expected, "pixel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_oversized_logical_screen_is_rejected_before_decoding() {
        let bytes = indexed_gif(20000, 20000, &[(0, 0, 1, 1, 0)]);
        assert!(bytes.len() < 64);
        assert!(matches!(
            decode_frames(&bytes, &DecodeLimits::default()),
            Err(Error::SourceTooLarge { width: 20000, height: 20000 })
        ));
    }

    #[test]
    fn test_oversized_png_is_rejected() {
        let bytes = png_bytes(RgbaImage::from_pixel(40, 10, Rgba([1, 2, 3, 255])));
        let limits = DecodeLimits {
            max_dimension: 32,
            ..DecodeLimits::default()
        };
        assert!(matches!(
            decode_frames(&bytes, &limits),
            Err(Error::SourceTooLarge { width: 40, height: 10 })
        ));
    }

    #[test]
    fn test_animation_exceeding_byte_budget_is_rejected() {
        let bytes = gif_bytes(&[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        let limits = DecodeLimits {
            max_decoded_bytes: 6 * 4 * 4 * 2,
            ..DecodeLimits::default()
        };
        assert!(matches!(
            decode_frames(&bytes, &limits),
            Err(Error::DecodeBudget { frames: 3, .. })
        ));
    }
}
