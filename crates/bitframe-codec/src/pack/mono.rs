//! 1-bit thresholded bitmap encoding.
//!
//! Blob layout:
//! - Header: width (u32, big-endian), height (u32, big-endian)
//! - Rows: MSB-first, 8 pixels per byte, each row padded to a whole byte
//! - Padding bits are set before inversion, every stored byte is inverted
//! - Frames follow each other with no separator

use image::{Rgb, RgbImage};

use crate::Frame;

/// Fraction of full scale a channel must exceed to count as lit.
pub const THRESHOLD_RATIO: f32 = 0.77;

/// Size of the embedded dimension header.
pub const HEADER_LEN: usize = 8;

/// Returns true if a red-channel sample is above the threshold.
#[inline]
pub fn is_lit(red: u8) -> bool {
    f32::from(red) > THRESHOLD_RATIO * f32::from(u8::MAX)
}

/// Bytes per packed row.
#[inline]
pub fn row_stride(width: u32) -> usize {
    (width as usize).div_ceil(8)
}

/// Dimension header at the start of a mono blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonoHeader {
    pub width: u32,
    pub height: u32,
}

impl MonoHeader {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(&self.width.to_be_bytes());
        bytes[4..].copy_from_slice(&self.height.to_be_bytes());
        bytes
    }

    /// Reads the header from the front of a blob.
    pub fn parse(blob: &[u8]) -> Option<Self> {
        let width = u32::from_be_bytes(blob.get(0..4)?.try_into().ok()?);
        let height = u32::from_be_bytes(blob.get(4..8)?.try_into().ok()?);
        Some(Self { width, height })
    }
}

/// Appends the packed rows of one frame to `out`.
pub fn pack_frame(frame: &Frame, out: &mut Vec<u8>) {
    let width = frame.width();
    let tail = width % 8;
    out.reserve(row_stride(width) * frame.height() as usize);

    for row in frame.image.rows() {
        let mut byte = 0u8;
        for (x, pixel) in row.enumerate() {
            if is_lit(pixel[0]) {
                byte |= 0x80 >> (x % 8);
            }
            if x % 8 == 7 {
                out.push(!byte);
                byte = 0;
            }
        }
        if tail != 0 {
            byte |= 0xFF >> tail;
            out.push(!byte);
        }
    }
}

/// Expands one packed frame back to black and white pixels.
pub fn unpack_frame(packed: &[u8], width: u32, height: u32) -> RgbImage {
    let stride = row_stride(width);
    RgbImage::from_fn(width, height, |x, y| {
        let byte = !packed[y as usize * stride + x as usize / 8];
        if byte & (0x80 >> (x % 8)) != 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Frame {
        Frame::new(0, RgbImage::from_fn(width, height, |x, y| {
            let v = f(x, y);
            Rgb([v, v, v])
        }))
    }

    #[test]
    fn test_threshold() {
        // 0.77 * 255 = 196.35
        assert!(!is_lit(0));
        assert!(!is_lit(196));
        assert!(is_lit(197));
        assert!(is_lit(255));
    }

    #[test]
    fn test_threshold_reads_red_only() {
        let lit_red = Frame::new(0, RgbImage::from_pixel(8, 1, Rgb([255, 0, 0])));
        let lit_blue = Frame::new(0, RgbImage::from_pixel(8, 1, Rgb([0, 0, 255])));
        let mut out = Vec::new();
        pack_frame(&lit_red, &mut out);
        pack_frame(&lit_blue, &mut out);
        assert_eq!(out, vec![0x00, 0xFF]);
    }

    #[test]
    fn test_white_row_with_padding_inverts_to_zero() {
        let mut out = Vec::new();
        pack_frame(&frame(2, 2, |_, _| 255), &mut out);
        assert_eq!(out, vec![0x00, 0x00]);
    }

    #[test]
    fn test_black_row_keeps_padding_bits() {
        // Pre-inversion 0b0001_1111: three dark pixels, five padding bits.
        let mut out = Vec::new();
        pack_frame(&frame(3, 1, |_, _| 0), &mut out);
        assert_eq!(out, vec![0b1110_0000]);
    }

    #[test]
    fn test_msb_first_bit_order() {
        // Only the first pixel lit: pre-inversion 0x80, stored 0x7F.
        let mut out = Vec::new();
        pack_frame(&frame(8, 1, |x, _| if x == 0 { 255 } else { 0 }), &mut out);
        assert_eq!(out, vec![0x7F]);
    }

    #[test]
    fn test_rows_pad_independently() {
        // 10 wide: two bytes per row, second byte has 2 pixels + 6 padding.
        let mut out = Vec::new();
        pack_frame(&frame(10, 2, |_, y| if y == 0 { 0 } else { 255 }), &mut out);
        assert_eq!(out, vec![0xFF, 0xC0, 0x00, 0x00]);
    }

    #[test]
    fn test_header() {
        let header = MonoHeader::new(384, 160);
        assert_eq!(header.to_bytes(), [0, 0, 1, 128, 0, 0, 0, 160]);
        assert_eq!(MonoHeader::parse(&header.to_bytes()), Some(header));
        assert_eq!(MonoHeader::parse(&[0, 0, 1]), None);
    }

    #[test]
    fn test_unpack_frame() {
        let source = frame(11, 3, |x, y| if (x + y) % 3 == 0 { 255 } else { 0 });
        let mut packed = Vec::new();
        pack_frame(&source, &mut packed);
        let image = unpack_frame(&packed, 11, 3);
        for (x, y, px) in image.enumerate_pixels() {
            let expected = if (x + y) % 3 == 0 { 255 } else { 0 };
            assert_eq!(px[0], expected, "pixel {},{}", x, y);
        }
    }
}
