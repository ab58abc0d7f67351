//! Frame quality filter
//!
//! Rejects near-black, near-white, blank or flash-corrupted frames before they
//! are persisted, whether or not they start a segment.

use image::RgbImage;
use succession_core::frame::mean_intensity;
use succession_core::{Frame, QualityBounds};

/// Returns true if the frame's mean grayscale intensity lies strictly between
/// the configured bounds
pub fn is_clear_frame(frame: &Frame, bounds: &QualityBounds) -> bool {
    is_clear_image_within(&frame.image, bounds)
}

/// Quality test of a bare image against the default bounds (10, 245)
pub fn is_clear_image(image: &RgbImage) -> bool {
    is_clear_image_within(image, &QualityBounds::default())
}

pub fn is_clear_image_within(image: &RgbImage, bounds: &QualityBounds) -> bool {
    bounds.contains(mean_intensity(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn uniform(value: u8) -> RgbImage {
        RgbImage::from_pixel(16, 16, Rgb([value, value, value]))
    }

    #[test]
    fn test_black_and_white_frames_are_rejected() {
        assert!(!is_clear_image(&uniform(0)));
        assert!(!is_clear_image(&uniform(255)));
    }

    #[test]
    fn test_mid_gray_frame_is_accepted() {
        assert!(is_clear_image(&uniform(128)));
    }

    #[test]
    fn test_bounds_are_exclusive() {
        let bounds = QualityBounds::default();
        assert!(!is_clear_frame(&Frame::new(uniform(10)), &bounds));
        assert!(is_clear_frame(&Frame::new(uniform(11)), &bounds));
        assert!(is_clear_frame(&Frame::new(uniform(244)), &bounds));
        assert!(!is_clear_frame(&Frame::new(uniform(245)), &bounds));
    }

    #[test]
    fn test_custom_bounds() {
        let bounds = QualityBounds {
            lower: 100.0,
            upper: 150.0,
        };
        assert!(!is_clear_frame(&Frame::new(uniform(90)), &bounds));
        assert!(is_clear_frame(&Frame::new(uniform(120)), &bounds));
    }

    #[test]
    fn test_mostly_black_frame_with_bright_patch() {
        let mut img = uniform(0);
        for y in 0..2 {
            for x in 0..16 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        // mean = 2/16 * 255 ≈ 31.9
        assert!(is_clear_image(&img));
    }
}
