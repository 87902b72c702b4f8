//! Geometry normalization.
//!
//! Each frame is scaled to fit inside the target box with its aspect ratio
//! intact, then centered on an opaque black canvas of exactly the target
//! size.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::{DecodedFrame, Error, Frame, Result, MAX_DIMENSION};

/// Fill color for the canvas area the scaled frame does not cover.
pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Resampling filter used when scaling frames.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Computes the size of a `src_width`x`src_height` image scaled to fit
/// inside `target_width`x`target_height`.
///
/// Both sides are rounded and clamped to `1..=target`.
pub fn fit_within(src_width: u32, src_height: u32, target_width: u32, target_height: u32) -> (u32, u32) {
    let scale = f64::min(
        target_width as f64 / src_width as f64,
        target_height as f64 / src_height as f64,
    );
    let width = (src_width as f64 * scale).round() as u32;
    let height = (src_height as f64 * scale).round() as u32;
    (width.clamp(1, target_width), height.clamp(1, target_height))
}

/// Checks that a target canvas is usable.
pub fn validate_target(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Fits one frame onto a `width`x`height` canvas.
pub fn normalize_frame(frame: &DecodedFrame, width: u32, height: u32) -> Result<Frame> {
    validate_target(width, height)?;
    if frame.width() == 0 || frame.height() == 0 {
        return Err(Error::EmptyFrame { index: frame.index });
    }

    let (scaled_width, scaled_height) = fit_within(frame.width(), frame.height(), width, height);
    let scaled = if (scaled_width, scaled_height) == (frame.width(), frame.height()) {
        frame.image.clone()
    } else {
        imageops::resize(&frame.image, scaled_width, scaled_height, RESIZE_FILTER)
    };

    let x = (width - scaled_width) / 2;
    let y = (height - scaled_height) / 2;

    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);

    Ok(Frame::new(frame.index, DynamicImage::ImageRgba8(canvas).to_rgb8()))
}

/// Fits every frame onto a `width`x`height` canvas, preserving order.
pub fn normalize_frames(frames: &[DecodedFrame], width: u32, height: u32) -> Result<Vec<Frame>> {
    frames
        .iter()
        .map(|frame| normalize_frame(frame, width, height))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(index: usize, width: u32, height: u32) -> DecodedFrame {
        DecodedFrame::new(index, RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(100, 50, 40, 40), (40, 20));
        assert_eq!(fit_within(50, 100, 40, 40), (20, 40));
        assert_eq!(fit_within(10, 10, 40, 20), (20, 20));
        assert_eq!(fit_within(1000, 1, 10, 10), (10, 1));
    }

    #[test]
    fn test_output_matches_target_for_any_aspect() {
        for (sw, sh) in [(1, 1), (7, 3), (3, 7), (384, 384), (1000, 17), (17, 1000)] {
            for (tw, th) in [(1, 1), (8, 8), (128, 160), (384, 384), (13, 5)] {
                let frame = normalize_frame(&solid(0, sw, sh), tw, th).unwrap();
                assert_eq!((frame.width(), frame.height()), (tw, th));
            }
        }
    }

    #[test]
    fn test_letterbox_is_black_and_centered() {
        // 4x2 white into 4x4: rows 0 and 3 are border, rows 1-2 are content.
        let frame = normalize_frame(&solid(0, 4, 2), 4, 4).unwrap();
        for x in 0..4 {
            assert_eq!(frame.image.get_pixel(x, 0), &Rgb([0, 0, 0]));
            assert_eq!(frame.image.get_pixel(x, 1), &Rgb([255, 255, 255]));
            assert_eq!(frame.image.get_pixel(x, 2), &Rgb([255, 255, 255]));
            assert_eq!(frame.image.get_pixel(x, 3), &Rgb([0, 0, 0]));
        }
    }

    #[test]
    fn test_transparency_becomes_background() {
        let clear = DecodedFrame::new(0, RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 0])));
        let frame = normalize_frame(&clear, 2, 2).unwrap();
        assert!(frame.image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_frame_order_preserved() {
        let frames = vec![solid(0, 3, 3), solid(1, 5, 2), solid(2, 2, 9)];
        let normalized = normalize_frames(&frames, 6, 6).unwrap();
        let indices: Vec<_> = normalized.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_rejects_bad_target() {
        assert!(normalize_frame(&solid(0, 2, 2), 0, 10).is_err());
        assert!(normalize_frame(&solid(0, 2, 2), 10, MAX_DIMENSION + 1).is_err());
    }
}
