//! 16-bit RGB565 encoding.
//!
//! Pixels are written big-endian, row-major, with no row padding and no
//! header.

use image::{Rgb, RgbImage};

use crate::Frame;

/// Bytes per encoded pixel.
pub const BYTES_PER_PIXEL: usize = 2;

/// Converts RGB888 to RGB565.
#[inline]
pub fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r >> 3) as u16;
    let g6 = (g >> 2) as u16;
    let b5 = (b >> 3) as u16;
    (r5 << 11) | (g6 << 5) | b5
}

/// Converts RGB565 to RGB888.
#[inline]
pub fn rgb565_to_rgb888(pixel: u16) -> (u8, u8, u8) {
    let r = ((pixel >> 11) & 0x1F) as u8;
    let g = ((pixel >> 5) & 0x3F) as u8;
    let b = (pixel & 0x1F) as u8;
    // Expand to 8-bit
    let r8 = (r << 3) | (r >> 2);
    let g8 = (g << 2) | (g >> 4);
    let b8 = (b << 3) | (b >> 2);
    (r8, g8, b8)
}

/// Appends the encoded pixels of one frame to `out`.
pub fn pack_frame(frame: &Frame, out: &mut Vec<u8>) {
    out.reserve(frame.image.len() / 3 * BYTES_PER_PIXEL);
    for pixel in frame.image.pixels() {
        let [r, g, b] = pixel.0;
        out.extend_from_slice(&rgb888_to_rgb565(r, g, b).to_be_bytes());
    }
}

/// Expands one encoded frame back to 8-bit RGB.
pub fn unpack_frame(packed: &[u8], width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let offset = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
        let pixel = u16::from_be_bytes([packed[offset], packed[offset + 1]]);
        let (r, g, b) = rgb565_to_rgb888(pixel);
        Rgb([r, g, b])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb565_conversion() {
        assert_eq!(rgb888_to_rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb888_to_rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb888_to_rgb565(0, 0, 255), 0x001F);
        assert_eq!(rgb888_to_rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb888_to_rgb565(0, 0, 0), 0x0000);
    }

    #[test]
    fn test_low_bits_are_truncated() {
        assert_eq!(rgb888_to_rgb565(7, 3, 7), 0x0000);
        assert_eq!(rgb888_to_rgb565(8, 4, 8), 0x0841);
    }

    #[test]
    fn test_pack_frame_is_big_endian_row_major() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 255, 0]));
        image.put_pixel(0, 1, Rgb([0, 0, 255]));
        image.put_pixel(1, 1, Rgb([0, 0, 0]));

        let mut out = Vec::new();
        pack_frame(&Frame::new(0, image), &mut out);
        assert_eq!(out, vec![0xF8, 0x00, 0x07, 0xE0, 0x00, 0x1F, 0x00, 0x00]);
    }

    #[test]
    fn test_unpack_expands_full_scale() {
        let image = unpack_frame(&[0xFF, 0xFF, 0x00, 0x00], 2, 1);
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }
}
